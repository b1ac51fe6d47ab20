//! The five cognitive sectors used to classify memories and route
//! embedding models.

use serde::{Deserialize, Serialize};

use crate::errors::OmError;

/// Cognitive partition a memory belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Episodic,
    Semantic,
    Procedural,
    Reflective,
    Emotional,
}

impl Sector {
    /// All sectors, in canonical order.
    pub const ALL: [Sector; 5] = [
        Sector::Episodic,
        Sector::Semantic,
        Sector::Procedural,
        Sector::Reflective,
        Sector::Emotional,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Episodic => "episodic",
            Sector::Semantic => "semantic",
            Sector::Procedural => "procedural",
            Sector::Reflective => "reflective",
            Sector::Emotional => "emotional",
        }
    }

    /// Parse a sector name. Case-insensitive.
    pub fn parse(s: &str) -> Result<Self, OmError> {
        match s.to_ascii_lowercase().as_str() {
            "episodic" => Ok(Sector::Episodic),
            "semantic" => Ok(Sector::Semantic),
            "procedural" => Ok(Sector::Procedural),
            "reflective" => Ok(Sector::Reflective),
            "emotional" => Ok(Sector::Emotional),
            other => Err(OmError::Validation {
                message: format!("unknown sector '{other}'"),
            }),
        }
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_sector_name() {
        for sector in Sector::ALL {
            assert_eq!(Sector::parse(sector.as_str()).unwrap(), sector);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Sector::parse("Episodic").unwrap(), Sector::Episodic);
        assert_eq!(Sector::parse("SEMANTIC").unwrap(), Sector::Semantic);
    }

    #[test]
    fn unknown_sector_is_a_validation_error() {
        assert!(matches!(
            Sector::parse("working"),
            Err(OmError::Validation { .. })
        ));
    }
}
