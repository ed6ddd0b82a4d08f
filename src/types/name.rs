use std::fmt::Display;

/// Prefix every pack topic carries
pub const PACK_PREFIX: &str = "pack-";
/// Longest legal topic name
pub const MAX_TOPIC_NAME_LEN: usize = 249;

/// The first naming rule a candidate topic name breaks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTopicName {
    #[error("topic name is empty")]
    Empty,
    #[error("'{0}' is reserved and cannot be used as a topic name")]
    Reserved(String),
    #[error("topic name is {0} characters long, the maximum is 249")]
    TooLong(usize),
    #[error("topic name contains illegal character {0:?}, only [a-zA-Z0-9._-] are allowed")]
    IllegalCharacter(char),
}

/// A topic name that passed every naming rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicName(String);

impl TopicName {
    /// Validates the given name as is
    pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidTopicName> {
        let raw = raw.into();
        check_topic_name(&raw)?;
        Ok(Self(raw))
    }

    /// Normalizes the given name into the pack namespace and validates the result
    pub fn pack(raw: &str) -> Result<Self, InvalidTopicName> {
        Self::parse(to_pack_name(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_pack(&self) -> bool {
        self.0.starts_with(PACK_PREFIX)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for TopicName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TopicName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for TopicName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TopicName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Returns the pack form of the given name. Names already carrying the prefix are returned
/// unchanged, so this is idempotent.
pub fn to_pack_name(raw: &str) -> String {
    if raw.starts_with(PACK_PREFIX) {
        raw.to_owned()
    } else {
        format!("{PACK_PREFIX}{raw}")
    }
}

pub fn is_valid_topic_name(name: &str) -> bool {
    check_topic_name(name).is_ok()
}

/// Same as [`is_valid_topic_name`], with a missing name counting as invalid
pub fn is_valid_optional(name: Option<&str>) -> bool {
    name.map(is_valid_topic_name).unwrap_or(false)
}

/// Checks the naming rules in order and returns the first one that fails
pub fn check_topic_name(name: &str) -> Result<(), InvalidTopicName> {
    if name.is_empty() {
        return Err(InvalidTopicName::Empty);
    }
    if name == "." || name == ".." {
        return Err(InvalidTopicName::Reserved(name.to_owned()));
    }
    let len = name.chars().count();
    if len > MAX_TOPIC_NAME_LEN {
        return Err(InvalidTopicName::TooLong(len));
    }
    match name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        Some(c) => Err(InvalidTopicName::IllegalCharacter(c)),
        None => Ok(()),
    }
}
