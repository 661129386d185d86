//! Entity ID type representing a domain.object_id pair

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid entity IDs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity_id must contain exactly one '.' separator")]
    InvalidFormat,

    #[error("domain cannot be empty")]
    EmptyDomain,

    #[error("object_id cannot be empty")]
    EmptyObjectId,

    #[error("domain contains invalid characters")]
    InvalidDomainChars,

    #[error("object_id contains invalid characters")]
    InvalidObjectIdChars,
}

/// An entity ID such as `sensor.espresso_machine_status`
///
/// Both parts are lowercase alphanumeric with underscores, and neither may
/// start or end with an underscore. The domain additionally may not contain
/// a double underscore.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    pub fn new(
        domain: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let domain = domain.into();
        let object_id = object_id.into();

        if domain.is_empty() {
            return Err(EntityIdError::EmptyDomain);
        }
        if object_id.is_empty() {
            return Err(EntityIdError::EmptyObjectId);
        }
        if domain.contains("__") || !is_valid_part(&domain) {
            return Err(EntityIdError::InvalidDomainChars);
        }
        if !is_valid_part(&object_id) {
            return Err(EntityIdError::InvalidObjectIdChars);
        }

        Ok(Self { domain, object_id })
    }

    /// Build an entity ID from a display name, e.g. `("sensor", "Kitchen Status")`
    /// becomes `sensor.kitchen_status`.
    ///
    /// Names that slugify to nothing fall back to the object id `unnamed`.
    pub fn from_name(domain: &str, name: &str) -> Result<Self, EntityIdError> {
        let slug = slugify(name);
        if slug.is_empty() {
            Self::new(domain, "unnamed")
        } else {
            Self::new(domain, slug)
        }
    }

    /// Same entity ID with `_<n>` appended to the object id
    pub fn with_suffix(&self, n: usize) -> Self {
        Self {
            domain: self.domain.clone(),
            object_id: format!("{}_{}", self.object_id, n),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

fn is_valid_part(s: &str) -> bool {
    !s.starts_with('_')
        && !s.ends_with('_')
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Turn arbitrary text into an object-id slug
///
/// Lowercases ASCII letters and digits, collapses every run of other
/// characters into a single underscore, and trims underscores at both ends.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((domain, object_id)) if !object_id.contains('.') => Self::new(domain, object_id),
            _ => Err(EntityIdError::InvalidFormat),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entity_id() {
        let id: EntityId = "sensor.espresso_status".parse().unwrap();
        assert_eq!(id.domain(), "sensor");
        assert_eq!(id.object_id(), "espresso_status");
        assert_eq!(id.to_string(), "sensor.espresso_status");
    }

    #[test]
    fn test_invalid_entity_ids() {
        assert_eq!(
            "no_separator".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
        assert_eq!(
            "too.many.parts".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
        assert_eq!(
            "sensor.".parse::<EntityId>().unwrap_err(),
            EntityIdError::EmptyObjectId
        );
        assert_eq!(
            "Sensor.status".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidDomainChars
        );
        assert_eq!(
            "my__domain.status".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidDomainChars
        );
        assert_eq!(
            "sensor._status".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidObjectIdChars
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Kitchen Brew Espresso"), "kitchen_brew_espresso");
        assert_eq!(slugify("  Progress (%) "), "progress");
        assert_eq!(slugify("Cappuccino+Mix"), "cappuccino_mix");
        assert_eq!(slugify("Profile 2"), "profile_2");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_from_name_and_suffix() {
        let id = EntityId::from_name("button", "Brew Espresso").unwrap();
        assert_eq!(id.to_string(), "button.brew_espresso");
        assert_eq!(id.with_suffix(2).to_string(), "button.brew_espresso_2");

        let unnamed = EntityId::from_name("sensor", "***").unwrap();
        assert_eq!(unnamed.to_string(), "sensor.unnamed");
    }

    #[test]
    fn test_serde_as_string() {
        let id = EntityId::new("switch", "power").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"switch.power\"");

        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
