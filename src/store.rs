//! Working-state store: the one place the raw model list, the selection and
//! the patch setup live.

use crate::models::{Model, Reconciliation};
use crate::patch::{compose, ActiveSet, Patch, PatchRegistry};

/// Identifies one issued catalog fetch. Only the latest ticket may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

/// Mutable session state behind the panel.
///
/// All mutations are synchronous. The effective list is never cached; every
/// read goes through [`compose`].
#[derive(Debug, Clone)]
pub struct WorkingState {
    models: Vec<Model>,
    selected: Option<Model>,
    missing: Vec<Model>,
    registry: PatchRegistry,
    active: ActiveSet,
    generation: u64,
}

impl WorkingState {
    /// Empty list, `default` patch registered and active.
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            selected: None,
            missing: Vec::new(),
            registry: PatchRegistry::with_default(),
            active: ActiveSet::new(),
            generation: 0,
        }
    }

    // ============================================================
    // Models and selection
    // ============================================================

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Replace the raw list wholesale. The selection is cleared since its id
    /// may no longer exist.
    pub fn set_models(&mut self, models: Vec<Model>) {
        self.models = models;
        self.selected = None;
    }

    /// Append models, e.g. freshly created ones. The selection is kept.
    pub fn extend_models(&mut self, models: impl IntoIterator<Item = Model>) {
        self.models.extend(models);
    }

    pub fn selected(&self) -> Option<&Model> {
        self.selected.as_ref()
    }

    pub fn set_selected(&mut self, model: Option<Model>) {
        self.selected = model;
    }

    /// Select the raw model with this id. Returns `false` if there is none.
    pub fn select_by_id(&mut self, id: &str) -> bool {
        match self.models.iter().find(|m| m.id == id) {
            Some(model) => {
                self.selected = Some(model.clone());
                true
            }
            None => false,
        }
    }

    pub fn missing(&self) -> &[Model] {
        &self.missing
    }

    pub fn set_missing(&mut self, missing: Vec<Model>) {
        self.missing = missing;
    }

    // ============================================================
    // Patches
    // ============================================================

    pub fn registry(&self) -> &PatchRegistry {
        &self.registry
    }

    pub fn active(&self) -> &ActiveSet {
        &self.active
    }

    /// Insert or replace a patch. A replaced name keeps its first position.
    pub fn register_patch(&mut self, name: impl Into<String>, patch: impl Patch + 'static) -> bool {
        self.registry.insert(name, patch)
    }

    pub fn activate(&mut self, name: impl Into<String>) -> bool {
        self.active.activate(name)
    }

    pub fn deactivate(&mut self, name: &str) -> bool {
        self.active.deactivate(name)
    }

    pub fn reset_active(&mut self) {
        self.active.reset();
    }

    /// The patch-composed view of the raw list.
    pub fn effective_models(&self) -> Vec<Model> {
        compose(&self.models, &self.registry, &self.active)
    }

    // ============================================================
    // Fetch ordering
    // ============================================================

    /// Issue a ticket for a fetch about to start. Any earlier ticket becomes stale.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        FetchTicket(self.generation)
    }

    /// The latest ticket, without issuing a new one. Writes that follow a
    /// network call check it with [`WorkingState::is_current`] without
    /// superseding fetches already in flight.
    pub fn current_ticket(&self) -> FetchTicket {
        FetchTicket(self.generation)
    }

    /// Make every ticket issued so far stale.
    pub fn invalidate_fetches(&mut self) {
        self.generation += 1;
    }

    /// Whether `ticket` is still the latest one issued.
    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.0 == self.generation
    }

    /// Apply a reconcile result if its ticket is still current.
    ///
    /// Returns `false` and leaves the state untouched for stale results.
    pub fn commit_fetch(&mut self, ticket: FetchTicket, result: Reconciliation) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(
                "Discarding stale fetch result (ticket {}, current {})",
                ticket.0,
                self.generation
            );
            return false;
        }
        self.set_models(result.list);
        self.missing = result.missing;
        true
    }

    /// Drop the list, selection and missing set and invalidate in-flight
    /// fetches. Patches stay registered.
    pub fn clear(&mut self) {
        self.models.clear();
        self.selected = None;
        self.missing.clear();
        self.invalidate_fetches();
    }
}

impl Default for WorkingState {
    fn default() -> Self {
        Self::new()
    }
}
