//! Rootfs failover: persistent counters in, boot verdict out

pub mod engine;
pub mod snapshot;

pub use engine::{validate, Termination, Verdict};
pub use snapshot::{CommitError, Counter, Snapshot};
