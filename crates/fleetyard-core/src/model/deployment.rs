//! Deployment requests

use super::environment::Accessibility;
use super::image::ImageSpec;
use crate::sizing::CapacityRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An additional storage volume to attach at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRequest {
    /// Drive letter the volume is mounted as (e.g. 'd')
    pub drive_letter: char,

    /// Size in GiB
    pub size_gib: u32,
}

/// Everything needed to place and materialize one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Base name, combined with environment and location by the namer
    pub base_name: String,

    pub accessibility: Accessibility,

    pub capacity: CapacityRequest,

    pub image: ImageSpec,

    #[serde(default)]
    pub volumes: Vec<VolumeRequest>,

    /// Extra tags applied to the instance
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl DeploymentConfig {
    pub fn new(
        base_name: impl Into<String>,
        accessibility: Accessibility,
        capacity: CapacityRequest,
        image: ImageSpec,
    ) -> Self {
        Self {
            base_name: base_name.into(),
            accessibility,
            capacity,
            image,
            volumes: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_volume(mut self, drive_letter: char, size_gib: u32) -> Self {
        self.volumes.push(VolumeRequest {
            drive_letter,
            size_gib,
        });
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Public-class instances get a publicly reachable address
    pub fn wants_public_address(&self) -> bool {
        self.accessibility == Accessibility::Public
    }
}
