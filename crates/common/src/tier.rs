//! Tier registry types.
//!
//! A tier is a named policy bundle: the set of derived heights that must
//! exist for every asset the owner holds, plus two capability flags.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use store::TierRow;

#[derive(Debug, thiserror::Error)]
pub enum TierError {
    #[error("tier heights must be positive, got {0}")]
    InvalidHeight(u32),
    #[error("tier name must not be empty")]
    EmptyName,
}

/// A named access tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    /// Heights, in pixels, at which derived assets must exist.
    pub required_heights: BTreeSet<u32>,
    /// Whether owners on this tier may fetch their original bytes.
    pub allow_original_access: bool,
    /// Whether owners on this tier may issue temporary links.
    pub allow_temporary_links: bool,
}

impl Tier {
    pub fn new(
        name: impl Into<String>,
        required_heights: impl IntoIterator<Item = u32>,
        allow_original_access: bool,
        allow_temporary_links: bool,
    ) -> Result<Self, TierError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TierError::EmptyName);
        }
        let required_heights: BTreeSet<u32> = required_heights.into_iter().collect();
        if let Some(&bad) = required_heights.iter().find(|&&h| h == 0) {
            return Err(TierError::InvalidHeight(bad));
        }
        Ok(Self {
            name,
            required_heights,
            allow_original_access,
            allow_temporary_links,
        })
    }
}

impl TryFrom<TierRow> for Tier {
    type Error = TierError;

    fn try_from(row: TierRow) -> Result<Self, TierError> {
        Tier::new(
            row.name,
            row.required_heights,
            row.allow_original,
            row.allow_temporary_links,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_height() {
        let err = Tier::new("free", [0, 200], false, false).unwrap_err();
        assert!(matches!(err, TierError::InvalidHeight(0)));
    }

    #[test]
    fn test_rejects_empty_name() {
        let err = Tier::new("", [200], false, false).unwrap_err();
        assert!(matches!(err, TierError::EmptyName));
    }

    #[test]
    fn test_heights_deduplicate() {
        let tier = Tier::new("basic", [200, 200, 400], false, false).unwrap();
        assert_eq!(
            tier.required_heights.iter().copied().collect::<Vec<_>>(),
            vec![200, 400]
        );
    }
}
