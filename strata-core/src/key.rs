//! Asset keys
//!
//! An asset key is the identity of a produced artifact: an ordered path of
//! name segments, namespace first and leaf name last.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used when an asset key is written as a selection clause
/// (`core>models>orders`).
pub const USER_STRING_SEPARATOR: char = '>';

/// Structural identity of an asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetKey(Vec<String>);

impl AssetKey {
    /// Create a key from its path segments
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(path.into_iter().map(Into::into).collect())
    }

    /// Parse a `>` separated user string (`"core>models>a"`)
    pub fn from_user_string(value: &str) -> Self {
        Self::new(value.split(USER_STRING_SEPARATOR))
    }

    /// Path segments, namespace first
    pub fn path(&self) -> &[String] {
        &self.0
    }

    /// Last segment of the path
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// Render as a selection clause (`core>models>a`)
    pub fn to_user_string(&self) -> String {
        self.0.join(&USER_STRING_SEPARATOR.to_string())
    }

    /// Return a new key with `prefix` prepended
    pub fn with_prefix(&self, prefix: &str) -> Self {
        let mut path = Vec::with_capacity(self.0.len() + 1);
        path.push(prefix.to_string());
        path.extend(self.0.iter().cloned());
        Self(path)
    }
}

impl From<&str> for AssetKey {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for AssetKey {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for AssetKey {
    fn from(path: Vec<String>) -> Self {
        Self(path)
    }
}

impl<const N: usize> From<[&str; N]> for AssetKey {
    fn from(path: [&str; N]) -> Self {
        Self::new(path)
    }
}

/// Renders as `AssetKey(['core', 'a'])`, the form used in definition errors.
impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetKey([")?;
        for (idx, segment) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{}'", segment)?;
        }
        write!(f, "])")
    }
}

/// Format a list of keys as `[AssetKey(['a']), AssetKey(['b'])]`
pub fn format_keys<'a>(keys: impl IntoIterator<Item = &'a AssetKey>) -> String {
    let rendered: Vec<String> = keys.into_iter().map(|k| k.to_string()).collect();
    format!("[{}]", rendered.join(", "))
}

/// Format a list of names as `['a', 'b']`
pub fn format_names<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let rendered: Vec<String> = names.into_iter().map(|n| format!("'{}'", n)).collect();
    format!("[{}]", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_definition_error_format() {
        assert_eq!(AssetKey::from("a").to_string(), "AssetKey(['a'])");
        assert_eq!(
            AssetKey::new(["core", "apple"]).to_string(),
            "AssetKey(['core', 'apple'])"
        );
    }

    #[test]
    fn test_user_string_round_trip() {
        let key = AssetKey::from_user_string("core>models>a");
        assert_eq!(key.path(), &["core", "models", "a"]);
        assert_eq!(key.name(), "a");
        assert_eq!(key.to_user_string(), "core>models>a");
    }

    #[test]
    fn test_with_prefix_twice() {
        let key = AssetKey::from("asset1").with_prefix("p").with_prefix("p");
        assert_eq!(key, AssetKey::new(["p", "p", "asset1"]));
    }

    #[test]
    fn test_ordering_is_by_segments() {
        let mut keys = vec![
            AssetKey::from("c"),
            AssetKey::from("a"),
            AssetKey::new(["a", "b"]),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                AssetKey::from("a"),
                AssetKey::new(["a", "b"]),
                AssetKey::from("c")
            ]
        );
    }

    #[test]
    fn test_format_helpers() {
        let keys = [AssetKey::from("a"), AssetKey::from("b")];
        assert_eq!(format_keys(&keys), "[AssetKey(['a']), AssetKey(['b'])]");
        assert_eq!(format_names(["foo", "bar"]), "['foo', 'bar']");
    }
}
