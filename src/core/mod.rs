//! Core deterministic primitives.
//!
//! All types in this module are designed for perfect cross-platform
//! determinism. Everything the tic loop computes flows through them.

pub mod angle;
pub mod fixed;
pub mod hash;
pub mod rng;

// Re-export core types
pub use angle::Angle;
pub use fixed::{Fixed, FRACBITS, FRACUNIT};
pub use hash::StateHasher;
pub use rng::GameRng;
