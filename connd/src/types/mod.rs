//! Type definitions and constants.

pub mod constants;
