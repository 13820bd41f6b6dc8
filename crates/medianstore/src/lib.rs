//! Top-level facade crate for medianstore.
//!
//! Re-exports the core primitives and the engine runtime so users can depend on a single crate.

pub mod core {
    pub use medianstore_core::*;
}

pub mod engine {
    pub use medianstore_engine::*;
}
