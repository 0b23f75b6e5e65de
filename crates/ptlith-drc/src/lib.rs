//! # Ptlith DRC
//!
//! Geometry checks run over freshly generated mask layouts before they are
//! written out: routing and pad rectangles must keep clear of the meander
//! trace, and nothing may extend past the die frame. Checks use the core
//! R-tree spatial index and report declarative violation records.

pub mod checks;
pub mod violation;

pub use checks::{check_trace_keepout, check_within_frame, has_errors, run_die_checks};
pub use violation::{DrcViolation, Severity, ViolationType};
