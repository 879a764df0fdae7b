//! Typed relationship between two notes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Relationship vocabulary. Anything outside the fixed set is `Custom`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LinkType {
    Related,
    Reference,
    FollowUp,
    Contradicts,
    Supports,
    Custom(String),
}

impl LinkType {
    /// Parse a type name. Unknown names become `Custom`.
    pub fn parse(s: &str) -> Self {
        match s {
            "Related" => Self::Related,
            "Reference" => Self::Reference,
            "FollowUp" => Self::FollowUp,
            "Contradicts" => Self::Contradicts,
            "Supports" => Self::Supports,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Name shown on an edge when the link has no label of its own
    pub fn display_name(&self) -> &str {
        match self {
            Self::Related => "Related",
            Self::Reference => "Reference",
            Self::FollowUp => "FollowUp",
            Self::Contradicts => "Contradicts",
            Self::Supports => "Supports",
            Self::Custom(label) => label,
        }
    }

    /// Whether links of this type point from source to target by default
    pub fn is_directional_by_default(&self) -> bool {
        matches!(self, Self::Reference | Self::FollowUp | Self::Supports)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl From<&str> for LinkType {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

/// Fixed palette a user may pick for a link, overriding the type color
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LinkColor {
    Purple,
    Yellow,
}

impl LinkColor {
    pub fn hex(&self) -> &'static str {
        match self {
            Self::Purple => "#8b5cf6",
            Self::Yellow => "#eab308",
        }
    }
}

impl fmt::Display for LinkColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Purple => write!(f, "purple"),
            Self::Yellow => write!(f, "yellow"),
        }
    }
}

impl FromStr for LinkColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "purple" => Ok(Self::Purple),
            "yellow" => Ok(Self::Yellow),
            _ => Err(format!("Unknown link color: {}", s)),
        }
    }
}

/// A stored link between two notes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub link_type: LinkType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub color: Option<LinkColor>,
    /// Explicit override of the type's default directionality
    #[serde(default)]
    pub directional: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl Link {
    /// Materialize a link request under the given id
    pub fn from_new(id: impl Into<String>, new: NewLink) -> Self {
        Self {
            id: id.into(),
            source_id: new.source_id,
            target_id: new.target_id,
            link_type: new.link_type,
            label: new.label,
            color: new.color,
            directional: new.directional,
            created_at: Utc::now(),
        }
    }

    /// True if either endpoint is `note_id`
    pub fn touches(&self, note_id: &str) -> bool {
        self.source_id == note_id || self.target_id == note_id
    }

    /// Order-independent key for the endpoint pair
    pub fn pair_key(&self) -> (&str, &str) {
        if self.source_id <= self.target_id {
            (&self.source_id, &self.target_id)
        } else {
            (&self.target_id, &self.source_id)
        }
    }
}

/// Parameters of a link creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewLink {
    pub source_id: String,
    pub target_id: String,
    pub link_type: LinkType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub color: Option<LinkColor>,
    #[serde(default)]
    pub directional: Option<bool>,
}

impl NewLink {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        link_type: impl Into<LinkType>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            link_type: link_type.into(),
            label: None,
            color: None,
            directional: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_color(mut self, color: LinkColor) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_directional(mut self, directional: bool) -> Self {
        self.directional = Some(directional);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_type_parse_known_and_custom() {
        assert_eq!(LinkType::parse("Reference"), LinkType::Reference);
        assert_eq!(LinkType::parse("FollowUp"), LinkType::FollowUp);
        assert_eq!(
            LinkType::parse("Inspired by"),
            LinkType::Custom("Inspired by".into())
        );
        assert_eq!(LinkType::Custom("Inspired by".into()).to_string(), "Inspired by");
    }

    #[test]
    fn test_default_directionality() {
        assert!(LinkType::Reference.is_directional_by_default());
        assert!(LinkType::FollowUp.is_directional_by_default());
        assert!(LinkType::Supports.is_directional_by_default());
        assert!(!LinkType::Related.is_directional_by_default());
        assert!(!LinkType::Contradicts.is_directional_by_default());
        assert!(!LinkType::Custom("x".into()).is_directional_by_default());
    }

    #[test]
    fn test_link_color_parse() {
        assert_eq!(LinkColor::from_str("Yellow").unwrap(), LinkColor::Yellow);
        assert_eq!(LinkColor::Purple.hex(), "#8b5cf6");
        assert!(LinkColor::from_str("green").is_err());
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        let ab = Link::from_new("l1", NewLink::new("a", "b", LinkType::Related));
        let ba = Link::from_new("l2", NewLink::new("b", "a", LinkType::Related));
        assert_eq!(ab.pair_key(), ba.pair_key());
        assert_eq!(ab.pair_key(), ("a", "b"));
    }

    #[test]
    fn test_link_serde_shape() {
        let link = Link::from_new(
            "l1",
            NewLink::new("a", "b", "Blocks").with_color(LinkColor::Yellow),
        );
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["link_type"]["Custom"], "Blocks");
        assert_eq!(json["color"], "yellow");

        let back: Link = serde_json::from_value(json).unwrap();
        assert_eq!(back, link);
    }
}
