//! Public API module.
//!
//! The [`Manager`](manager::Manager) context, configuration and the shared
//! model types.

pub mod config;
pub mod manager;
pub mod models;
