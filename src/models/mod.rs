//! Domain models for the panel.
//!
//! - [`Model`]: one catalog entry, with [`ModelMeta`] and [`Tag`]s. Fields the
//!   panel never interprets are carried through verbatim.
//! - [`ApiConfig`]: base URL and token of the remote catalog.
//! - [`Reconciliation`], [`SaveReport`], [`CreateReport`]: results of the
//!   fetch, save and create operations.
//! - [`SessionPhase`] / [`SessionStatus`]: where the panel lifecycle stands.

mod model;
mod session;

pub use model::*;
pub use session::*;
