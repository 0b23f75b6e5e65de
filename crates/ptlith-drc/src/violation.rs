use serde::{Deserialize, Serialize};

/// Type of DRC violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ViolationType {
    /// Two shapes on the same layer are closer than the rule allows.
    MinSpacing,
    /// A shape intrudes into a keepout region (e.g. the meander trace).
    Overlap,
    /// A shape sticks out of the die frame.
    OutOfBounds,
    Custom(String),
}

/// Severity level of a DRC violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single DRC violation with location and description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrcViolation {
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub rule_name: String,
    pub message: String,
    pub layer_id: u32,
    /// Bounding box of the violation region: [min_x, min_y, max_x, max_y]
    pub bbox: [f64; 4],
    /// Indices of the geometries involved.
    pub geometry_indices: Vec<usize>,
}
