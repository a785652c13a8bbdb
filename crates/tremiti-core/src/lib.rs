//! Core types and trait definitions for the Tremiti ticket pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it.

pub mod archive;
pub mod delivery;
pub mod error;
pub mod queue;
pub mod store;
pub mod ticket;
pub mod validate;

pub use error::{Error, Result, ValidationError};
