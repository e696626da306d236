use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Optional messaging feature whose availability depends on provider and thread context.
///
/// ```
/// use chatmux_core::CapabilityTag;
///
/// let tag: CapabilityTag = "reply".parse().unwrap();
/// assert_eq!(tag, CapabilityTag::Reply);
/// assert_eq!(CapabilityTag::Custom("reactions".into()).to_string(), "reactions");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CapabilityTag {
    Reply,
    Attachments,
    Subject,
    Custom(String),
}

impl CapabilityTag {
    pub fn as_str(&self) -> &str {
        match self {
            CapabilityTag::Reply => "reply",
            CapabilityTag::Attachments => "attachments",
            CapabilityTag::Subject => "subject",
            CapabilityTag::Custom(name) => name,
        }
    }
}

impl FromStr for CapabilityTag {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Ok(match normalized.as_str() {
            "reply" => CapabilityTag::Reply,
            "attachments" => CapabilityTag::Attachments,
            "subject" => CapabilityTag::Subject,
            _ => CapabilityTag::Custom(normalized),
        })
    }
}

impl Display for CapabilityTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CapabilityTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CapabilityTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let Ok(tag) = raw.parse::<CapabilityTag>();
        Ok(tag)
    }
}

/// Availability of one capability, split by who created the thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRule {
    pub tag: CapabilityTag,
    /// Allowed on threads the local account created.
    #[serde(default)]
    pub when_local: bool,
    /// Allowed on threads someone else created.
    #[serde(default)]
    pub when_remote: bool,
}

impl CapabilityRule {
    pub fn new(tag: CapabilityTag, when_local: bool, when_remote: bool) -> Self {
        Self {
            tag,
            when_local,
            when_remote,
        }
    }

    /// Allowed regardless of thread origin.
    pub fn always(tag: CapabilityTag) -> Self {
        Self::new(tag, true, true)
    }
}

/// Declared feature support for a provider account.
///
/// Undeclared tags are unsupported.
///
/// ```
/// use chatmux_core::{CapabilityRule, CapabilityTable, CapabilityTag};
///
/// let table = CapabilityTable::new(vec![CapabilityRule::new(CapabilityTag::Reply, true, false)]);
/// assert!(table.allows(&CapabilityTag::Reply, true));
/// assert!(!table.allows(&CapabilityTag::Reply, false));
/// assert!(!table.allows(&CapabilityTag::Attachments, true));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityTable {
    rules: Vec<CapabilityRule>,
}

impl CapabilityTable {
    pub fn new(rules: Vec<CapabilityRule>) -> Self {
        Self { rules }
    }

    /// First matching rule wins.
    pub fn allows(&self, tag: &CapabilityTag, created_by_local_account: bool) -> bool {
        self.rules
            .iter()
            .find(|rule| &rule.tag == tag)
            .map(|rule| {
                if created_by_local_account {
                    rule.when_local
                } else {
                    rule.when_remote
                }
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_and_custom_tags() {
        assert_eq!(
            "Attachments".parse::<CapabilityTag>().unwrap(),
            CapabilityTag::Attachments
        );
        assert_eq!(
            " reactions ".parse::<CapabilityTag>().unwrap(),
            CapabilityTag::Custom("reactions".into())
        );
    }

    #[test]
    fn table_deserializes_from_rule_list() {
        let table: CapabilityTable = serde_json::from_value(json!([
            { "tag": "reply", "when_local": true, "when_remote": true },
            { "tag": "subject", "when_local": true }
        ]))
        .unwrap();
        assert!(table.allows(&CapabilityTag::Reply, false));
        assert!(table.allows(&CapabilityTag::Subject, true));
        assert!(!table.allows(&CapabilityTag::Subject, false));
    }

    #[test]
    fn first_rule_wins_for_duplicate_tags() {
        let table = CapabilityTable::new(vec![
            CapabilityRule::new(CapabilityTag::Reply, false, false),
            CapabilityRule::always(CapabilityTag::Reply),
        ]);
        assert!(!table.allows(&CapabilityTag::Reply, true));
    }
}
