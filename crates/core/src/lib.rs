//! `warehouse-core`: shared building blocks for the warehouse controller.
//!
//! This crate contains **pure** primitives (no IO, no async runtime): the error
//! taxonomy every layer converts into and the strongly-typed identifiers.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{ConnectionId, LocationId, SystemName};
