//! Deterministic in-process stand-ins for the external services.
//!
//! Every output is a pure function of its input (plus a generation counter
//! for the generator), which makes full optimization runs reproducible
//! without a model, an embedding service or a sandbox.

pub mod embedder;
pub mod generator;
pub mod tool_invoker;

pub use embedder::SyntheticEmbedder;
pub use generator::SyntheticGenerator;
pub use tool_invoker::SyntheticToolInvoker;

/// 64-bit FNV-1a.
pub(crate) fn fingerprint(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// Map a hash onto [0, 1).
pub(crate) fn unit(hash: u64) -> f64 {
    (hash % 10_000) as f64 / 10_000.0
}
