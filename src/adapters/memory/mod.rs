//! In-process adapters with no external storage.

pub mod cluster_repository;

pub use cluster_repository::InMemoryClusterRepository;
