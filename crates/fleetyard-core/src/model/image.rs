//! Machine image selection

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How to choose between several images matching a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// More than one match is an error
    FailOnMultiple,
    /// Pick the most recently created match
    MostRecent,
}

/// Resolved image selection stored on a reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSelector {
    Concrete {
        image_id: String,
    },
    Search {
        owner: String,
        name_pattern: String,
        tie_break: TieBreak,
    },
}

impl fmt::Display for ImageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSelector::Concrete { image_id } => write!(f, "{}", image_id),
            ImageSelector::Search {
                owner,
                name_pattern,
                ..
            } => write!(f, "{}/{}", owner, name_pattern),
        }
    }
}

/// Owner alias used when a search doesn't name one
pub const DEFAULT_IMAGE_OWNER: &str = "self";

/// Image request as written in a deployment configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Concrete provider image id; wins over any search fields
    #[serde(default)]
    pub image_id: Option<String>,

    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub name_pattern: Option<String>,

    /// Pick the newest match instead of failing on several
    #[serde(default)]
    pub most_recent: bool,
}

impl ImageSpec {
    pub fn concrete(image_id: impl Into<String>) -> Self {
        Self {
            image_id: Some(image_id.into()),
            ..Default::default()
        }
    }

    pub fn search(owner: impl Into<String>, name_pattern: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            name_pattern: Some(name_pattern.into()),
            ..Default::default()
        }
    }

    pub fn most_recent(mut self) -> Self {
        self.most_recent = true;
        self
    }

    /// Selector described by this image spec
    pub fn to_selector(&self) -> Result<ImageSelector> {
        if let Some(id) = self.image_id.as_deref().filter(|id| !id.trim().is_empty()) {
            return Ok(ImageSelector::Concrete {
                image_id: id.to_string(),
            });
        }

        let name_pattern = self
            .name_pattern
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                CoreError::InvalidImageSpec(
                    "either image_id or name_pattern must be set".to_string(),
                )
            })?;

        Ok(ImageSelector::Search {
            owner: self
                .owner
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE_OWNER.to_string()),
            name_pattern: name_pattern.to_string(),
            tie_break: if self.most_recent {
                TieBreak::MostRecent
            } else {
                TieBreak::FailOnMultiple
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concrete_id_wins() {
        let mut spec = ImageSpec::search("amazon", "ubuntu-*");
        spec.image_id = Some("ami-123".to_string());

        assert_eq!(
            spec.to_selector().unwrap(),
            ImageSelector::Concrete {
                image_id: "ami-123".to_string()
            }
        );
    }

    #[test]
    fn test_search_tie_break() {
        let selector = ImageSpec::search("amazon", "ubuntu-*").to_selector().unwrap();
        assert!(matches!(
            selector,
            ImageSelector::Search {
                tie_break: TieBreak::FailOnMultiple,
                ..
            }
        ));

        let selector = ImageSpec::search("amazon", "ubuntu-*")
            .most_recent()
            .to_selector()
            .unwrap();
        assert!(matches!(
            selector,
            ImageSelector::Search {
                tie_break: TieBreak::MostRecent,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_owner_defaults() {
        let spec = ImageSpec {
            name_pattern: Some("base-*".to_string()),
            ..Default::default()
        };
        match spec.to_selector().unwrap() {
            ImageSelector::Search { owner, .. } => assert_eq!(owner, DEFAULT_IMAGE_OWNER),
            other => panic!("unexpected selector {other:?}"),
        }
    }

    #[test]
    fn test_empty_spec_rejected() {
        assert!(matches!(
            ImageSpec::default().to_selector(),
            Err(CoreError::InvalidImageSpec(_))
        ));
    }

    #[test]
    fn test_selector_json_is_tagged() {
        let json = serde_json::to_value(ImageSelector::Concrete {
            image_id: "ami-1".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "concrete");
    }
}
