//! Compliance indicators over administration-stage checklist entries.
//!
//! CLMC is the share of administrations with all ten corrects verified;
//! TEAEM is the share with at least one missed. Both read the same
//! aggregate, so `teaem.numerator == denominator - clmc.numerator`.
//! The clock is always passed in by the caller.

mod engine;
mod types;

pub use engine::*;
pub use types::*;

// ── Tests ──────────────────────────────────────────────────────────────────
