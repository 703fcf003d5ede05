//! Backend for an OpenWebUI model-catalog admin panel.
//!
//! Connects to a remote catalog, reconciles its base and full listings,
//! runs the working set through a pipeline of named patches and writes the
//! result back.

pub mod api;
pub mod client;
pub mod config;
pub mod models;
pub mod panel;
pub mod patch;
pub mod prompt;
pub mod reconcile;
pub mod storage;
pub mod store;
pub mod transfer;
