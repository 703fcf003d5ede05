//! Named model transformations and the engine that applies them.
//!
//! A [`Patch`] is a pure `&Model -> Model` function. Patches live in a
//! [`PatchRegistry`], which remembers the order names were first registered
//! in, and an [`ActiveSet`] decides which of them run. [`compose`] folds the
//! active patches over every model in registration order.

mod compose;
mod edit;
mod icon;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

pub use compose::compose;
pub use edit::*;
pub use icon::*;

use crate::models::{Model, ModelMeta};

/// Name of the metadata fill patch present in every fresh registry.
pub const DEFAULT_PATCH: &str = "default";

/// A pure, total transformation of one model.
///
/// Implementations must not panic for any well-formed model and must keep
/// `id` unchanged.
pub trait Patch: Send + Sync {
    fn apply(&self, model: &Model) -> Model;
}

impl<F> Patch for F
where
    F: Fn(&Model) -> Model + Send + Sync,
{
    fn apply(&self, model: &Model) -> Model {
        self(model)
    }
}

/// Ordered mapping from patch name to patch.
///
/// Keeps an explicit key sequence next to the lookup table: replacing a
/// patch under an existing name keeps the name's original position.
#[derive(Clone, Default)]
pub struct PatchRegistry {
    order: Vec<String>,
    patches: HashMap<String, Arc<dyn Patch>>,
}

impl PatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the [`DEFAULT_PATCH`].
    pub fn with_default() -> Self {
        let mut registry = Self::new();
        registry.insert(DEFAULT_PATCH, fill_default_meta);
        registry
    }

    /// Insert or replace. Returns `true` when an existing patch was replaced.
    pub fn insert(&mut self, name: impl Into<String>, patch: impl Patch + 'static) -> bool {
        self.insert_shared(name, Arc::new(patch))
    }

    pub fn insert_shared(&mut self, name: impl Into<String>, patch: Arc<dyn Patch>) -> bool {
        let name = name.into();
        let replaced = self.patches.insert(name.clone(), patch).is_some();
        if !replaced {
            self.order.push(name);
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Patch>> {
        self.patches.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patches.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Patch>)> {
        self.order
            .iter()
            .filter_map(|name| self.patches.get(name).map(|p| (name.as_str(), p)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for PatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.order.iter()).finish()
    }
}

/// Names of the patches currently enabled.
///
/// May hold names the registry does not know; composition skips those.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSet {
    names: BTreeSet<String>,
}

impl ActiveSet {
    /// Starts with only [`DEFAULT_PATCH`] enabled.
    pub fn new() -> Self {
        Self {
            names: BTreeSet::from([DEFAULT_PATCH.to_string()]),
        }
    }

    pub fn empty() -> Self {
        Self {
            names: BTreeSet::new(),
        }
    }

    /// Returns `true` if the name was not active before.
    pub fn activate(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    /// Returns `true` if the name was active before.
    pub fn deactivate(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    /// Disable everything, including the default patch.
    pub fn reset(&mut self) {
        self.names.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ActiveSet {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Into<String>> FromIterator<S> for ActiveSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// The `default` patch: fill absent metadata, never overwrite.
pub fn fill_default_meta(model: &Model) -> Model {
    let fallback = ModelMeta::fallback();
    let meta = match &model.meta {
        Some(meta) => meta.filled_from(&fallback),
        None => fallback,
    };
    Model {
        meta: Some(meta),
        ..model.clone()
    }
}
