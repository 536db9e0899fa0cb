//! Wire types shared between the grading backend and the in-sandbox harness.
//!
//! - [`job`]: the job description the backend sends in, and its decoder
//! - [`types`]: framework-neutral raw results produced by the adapters
//! - [`verdict`]: the single normalized result line the harness emits

pub mod job;
pub mod types;
pub mod verdict;
