//! # ll-core
//!
//! Shared types for llflow: the error type used across the workspace and the
//! per-event record handed to the selection engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod event;

pub use error::{Error, Result};
pub use event::{DEFAULT_OBJECT_CAPACITY, Event, Met, Object, ObjectSlices};
