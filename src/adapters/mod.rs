//! Adapters implementing the domain ports.
//!
//! - `memory`: in-process cluster repository
//! - `synthetic`: deterministic generator, embedder and tool invoker

pub mod memory;
pub mod synthetic;

pub use memory::InMemoryClusterRepository;
pub use synthetic::{SyntheticEmbedder, SyntheticGenerator, SyntheticToolInvoker};
