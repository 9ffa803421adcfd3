//! Domain layer for the variant optimizer
//!
//! This module contains the core data model, the error taxonomy and the
//! port traits that external collaborators implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
