//! Cursor pagination over ordered name lists

use crate::{QueryError, Result};

/// Slice `items` by cursor, limit and direction
///
/// Forward pages hold the items strictly after the cursor, cut to `limit`
/// from the start. Reverse pages hold the items strictly before the cursor,
/// cut to `limit` from the end; they keep the original order. An empty
/// cursor means no cursor and a zero limit means no limit.
pub fn apply_cursor_limit_reverse<T>(
    items: &[T],
    cursor: Option<&str>,
    limit: Option<usize>,
    reverse: bool,
) -> Result<Vec<T>>
where
    T: AsRef<str> + Clone,
{
    let mut start = 0;
    let mut end = items.len();

    if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
        let index = items
            .iter()
            .position(|item| item.as_ref() == cursor)
            .ok_or_else(|| QueryError::CursorNotFound(cursor.to_string()))?;
        if reverse {
            end = index;
        } else {
            start = index + 1;
        }
    }

    if let Some(limit) = limit.filter(|l| *l > 0) {
        if reverse {
            start = end.saturating_sub(limit);
        } else {
            end = start.saturating_add(limit).min(items.len());
        }
    }

    if start >= end {
        return Ok(Vec::new());
    }
    Ok(items[start..end].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partitions() -> Vec<String> {
        (0..10).map(|i| format!("p{}", i)).collect()
    }

    #[test]
    fn test_forward_from_cursor() {
        let page = apply_cursor_limit_reverse(&partitions(), Some("p4"), Some(3), false).unwrap();
        assert_eq!(page, vec!["p5", "p6", "p7"]);
    }

    #[test]
    fn test_reverse_from_cursor() {
        let page = apply_cursor_limit_reverse(&partitions(), Some("p4"), Some(3), true).unwrap();
        assert_eq!(page, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_no_cursor() {
        let items = partitions();
        assert_eq!(apply_cursor_limit_reverse(&items, None, None, false).unwrap(), items);
        assert_eq!(
            apply_cursor_limit_reverse(&items, Some(""), Some(2), false).unwrap(),
            vec!["p0", "p1"]
        );
        assert_eq!(
            apply_cursor_limit_reverse(&items, None, Some(2), true).unwrap(),
            vec!["p8", "p9"]
        );
        assert_eq!(apply_cursor_limit_reverse(&items, None, Some(0), false).unwrap(), items);
    }

    #[test]
    fn test_limit_past_either_end() {
        let items = partitions();
        assert_eq!(
            apply_cursor_limit_reverse(&items, Some("p8"), Some(5), false).unwrap(),
            vec!["p9"]
        );
        assert_eq!(
            apply_cursor_limit_reverse(&items, Some("p1"), Some(5), true).unwrap(),
            vec!["p0"]
        );
        assert!(apply_cursor_limit_reverse(&items, Some("p9"), None, false)
            .unwrap()
            .is_empty());
        assert!(apply_cursor_limit_reverse(&items, Some("p0"), None, true)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unknown_cursor() {
        let err = apply_cursor_limit_reverse(&partitions(), Some("p42"), None, false).unwrap_err();
        assert_eq!(err, QueryError::CursorNotFound("p42".into()));
    }
}
