use std::sync::Arc;

use super::{ActiveSet, Patch, PatchRegistry};
use crate::models::Model;

/// Produce the effective model list.
///
/// The chain is every registry entry whose name is active, in registration
/// order (not activation order). Each model is folded through the chain on
/// its own, starting from a copy of the input. Active names missing from the
/// registry are skipped.
pub fn compose(models: &[Model], registry: &PatchRegistry, active: &ActiveSet) -> Vec<Model> {
    let chain: Vec<&Arc<dyn Patch>> = registry
        .iter()
        .filter(|(name, _)| active.contains(name))
        .map(|(_, patch)| patch)
        .collect();

    models
        .iter()
        .map(|model| {
            chain
                .iter()
                .fold(model.clone(), |current, patch| patch.apply(&current))
        })
        .collect()
}
