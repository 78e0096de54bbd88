//! Core connection management logic.
//!
//! The network entity and its lifecycle, the driver registry, the
//! collaborator seams and the asynchronous glue around them.

pub(crate) mod arena;
pub(crate) mod device;
pub(crate) mod element;
pub(crate) mod event_loop;
pub(crate) mod ipconfig;
pub(crate) mod lifecycle;
pub(crate) mod network;
pub mod portal;
pub(crate) mod registry;
pub(crate) mod scheduler;
pub(crate) mod service;
pub(crate) mod transport;
pub mod wpad;
