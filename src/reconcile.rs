//! Reconciliation of the base and full catalog listings.

use std::collections::HashSet;

use crate::models::{Model, Reconciliation};

/// Intersect the two listings by id.
///
/// `list` holds the full-list entries whose id appears in `base`, in full-list
/// order and with full-list content. `missing` holds the base entries with no
/// counterpart in `full`. Every base id ends up in exactly one of the two.
pub fn reconcile(base: &[Model], full: &[Model]) -> Reconciliation {
    let base_ids: HashSet<&str> = base.iter().map(|m| m.id.as_str()).collect();
    let full_ids: HashSet<&str> = full.iter().map(|m| m.id.as_str()).collect();

    let list = full
        .iter()
        .filter(|m| base_ids.contains(m.id.as_str()))
        .cloned()
        .collect();
    let missing: Vec<Model> = base
        .iter()
        .filter(|m| !full_ids.contains(m.id.as_str()))
        .cloned()
        .collect();

    if !missing.is_empty() {
        tracing::warn!(
            "{} base model(s) have no entry in the full listing",
            missing.len()
        );
    }

    Reconciliation { list, missing }
}
