//! Daemon lifecycle helpers.

pub mod shutdown;
