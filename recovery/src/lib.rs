//! Deterministic recovery and size governance for LLM task output.
//!
//! Raw model text goes through an ordered recovery cascade, is turned into a
//! [`core::types::RecordContract`] with every required field present, and is
//! then bounded to a size budget before it reaches persistence. The
//! architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (normalizing, parsing, repair,
//!   salvage, enforcement, governance). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config files, raw input, schema
//!   validation, reports).
//!
//! [`pipeline`] coordinates the two for callers and the diagnostic binary.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
