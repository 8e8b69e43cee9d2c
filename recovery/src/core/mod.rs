//! Deterministic, pure logic shared by the recovery pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests; the
//! only ambient input is the injected [`clock::Clock`].

pub mod budget;
pub mod cascade;
pub mod clock;
pub mod enforce;
pub mod fallback;
pub mod governor;
pub mod invariants;
pub mod normalize;
pub mod salvage;
pub mod scan;
pub mod stats;
pub mod strategy;
pub mod text;
pub mod tree_bound;
pub mod truncation;
pub mod types;
