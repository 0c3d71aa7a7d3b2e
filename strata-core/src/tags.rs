//! Run tags written by the framework

/// Tag holding the partition a run was launched for
pub const PARTITION_NAME_TAG: &str = "strata/partition";

/// Tag holding the partition set a run was launched from
pub const PARTITION_SET_TAG: &str = "strata/partition_set";

/// Tag holding the repository whose partition set launched a run
pub const REPOSITORY_TAG: &str = "strata/repository";

/// Prefix of tags that are managed by the framework
pub const SYSTEM_TAG_PREFIX: &str = "strata/";

/// Prefix of tags that are managed by the framework and never displayed
pub const HIDDEN_TAG_PREFIX: &str = ".strata/";

/// Visibility class of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    User,
    System,
    Hidden,
}

/// Classify a tag by its key
pub fn get_tag_type(key: &str) -> TagType {
    if key.starts_with(HIDDEN_TAG_PREFIX) {
        TagType::Hidden
    } else if key.starts_with(SYSTEM_TAG_PREFIX) {
        TagType::System
    } else {
        TagType::User
    }
}
