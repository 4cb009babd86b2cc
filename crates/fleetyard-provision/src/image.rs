//! Image resolution

use crate::error::{ProvisionError, Result, WorkflowStep};
use fleetyard_cloud::{CloudProvider, ImageSummary};
use fleetyard_core::{ImageSelector, TieBreak};

/// Outcome of applying a tie-break rule to search results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChoice {
    Found(String),
    NoMatch,
    Ambiguous(usize),
}

pub fn choose_image(images: &[ImageSummary], tie_break: TieBreak) -> ImageChoice {
    match (images, tie_break) {
        ([], _) => ImageChoice::NoMatch,
        ([only], _) => ImageChoice::Found(only.id.clone()),
        (many, TieBreak::FailOnMultiple) => ImageChoice::Ambiguous(many.len()),
        (many, TieBreak::MostRecent) => many
            .iter()
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            .map(|image| ImageChoice::Found(image.id.clone()))
            .unwrap_or(ImageChoice::NoMatch),
    }
}

/// Concrete image id for a selector, searching the provider when needed
pub async fn resolve_image(
    provider: &dyn CloudProvider,
    environment: &str,
    selector: &ImageSelector,
) -> Result<String> {
    let (owner, name_pattern, tie_break) = match selector {
        ImageSelector::Concrete { image_id } => return Ok(image_id.clone()),
        ImageSelector::Search {
            owner,
            name_pattern,
            tie_break,
        } => (owner, name_pattern, *tie_break),
    };

    let images = provider
        .find_images(owner, name_pattern)
        .await
        .map_err(|source| {
            ProvisionError::provider(WorkflowStep::FindImages, environment, selector, source)
        })?;

    match choose_image(&images, tie_break) {
        ImageChoice::Found(id) => {
            tracing::debug!("[{}] image {} resolved to {}", environment, selector, id);
            Ok(id)
        }
        ImageChoice::NoMatch => Err(ProvisionError::ImageNotFound {
            environment: environment.to_string(),
            owner: owner.clone(),
            name_pattern: name_pattern.clone(),
        }),
        ImageChoice::Ambiguous(count) => Err(ProvisionError::AmbiguousImage {
            environment: environment.to_string(),
            owner: owner.clone(),
            name_pattern: name_pattern.clone(),
            count,
        }),
    }
}
