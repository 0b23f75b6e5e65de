use ptlith_core::cell::Cell;
use ptlith_core::geometry::{BBox, GeomPrimitive};
use ptlith_core::spatial::{SpatialEntry, SpatialIndex};

use crate::violation::{DrcViolation, Severity, ViolationType};

/// Check that every rectangle and polygon on the trace's layer keeps at
/// least `min_clear` distance from the trace at `trace_index`.
///
/// Paths on the same layer are exempt: routing connects to the trace by
/// construction, so a bounding-box test against them is meaningless.
/// Bounding boxes are conservative for the shapes this toolkit generates
/// (axis-aligned rectangles and Manhattan traces).
pub fn check_trace_keepout(cell: &Cell, trace_index: usize, min_clear: f64) -> Vec<DrcViolation> {
    let mut violations = Vec::new();

    let trace = match cell.geometries.get(trace_index) {
        Some(g) => g,
        None => return violations,
    };
    let layer_id = trace.layer_id();
    let trace_bbox = match trace.bbox() {
        Some(bb) => bb,
        None => return violations,
    };

    let entries: Vec<SpatialEntry> = cell
        .geometries
        .iter()
        .enumerate()
        .filter(|(i, g)| {
            *i != trace_index
                && g.layer_id() == layer_id
                && matches!(g, GeomPrimitive::Rect(_) | GeomPrimitive::Polygon(_))
        })
        .filter_map(|(i, g)| {
            g.bbox().map(|bbox| SpatialEntry {
                geometry_index: i,
                bbox,
            })
        })
        .collect();
    let index = SpatialIndex::build(entries);

    for entry in index.query_clearance(&trace_bbox, min_clear) {
        let separation = trace_bbox.separation(&entry.bbox);
        if separation >= min_clear {
            continue;
        }
        let (violation_type, message) = if trace_bbox.intersects(&entry.bbox) {
            (
                ViolationType::Overlap,
                format!("shape {} overlaps the trace", entry.geometry_index),
            )
        } else {
            (
                ViolationType::MinSpacing,
                format!(
                    "shape {} is {:.3} um from the trace (minimum {:.3})",
                    entry.geometry_index, separation, min_clear
                ),
            )
        };
        violations.push(DrcViolation {
            violation_type,
            severity: Severity::Error,
            rule_name: "trace_keepout".to_string(),
            message,
            layer_id,
            bbox: [
                entry.bbox.min.x,
                entry.bbox.min.y,
                entry.bbox.max.x,
                entry.bbox.max.y,
            ],
            geometry_indices: vec![trace_index, entry.geometry_index],
        });
    }

    violations
}

/// Check that every geometry in the cell sits inside `frame`.
pub fn check_within_frame(cell: &Cell, frame: &BBox) -> Vec<DrcViolation> {
    let mut violations = Vec::new();

    for (i, geom) in cell.geometries.iter().enumerate() {
        let bbox = match geom.bbox() {
            Some(bb) => bb,
            None => continue,
        };
        if frame.contains(&bbox) {
            continue;
        }
        violations.push(DrcViolation {
            violation_type: ViolationType::OutOfBounds,
            severity: Severity::Error,
            rule_name: "die_frame".to_string(),
            message: format!(
                "shape {} extends outside the die frame ({:.1} x {:.1})",
                i,
                frame.width(),
                frame.height()
            ),
            layer_id: geom.layer_id(),
            bbox: [bbox.min.x, bbox.min.y, bbox.max.x, bbox.max.y],
            geometry_indices: vec![i],
        });
    }

    violations
}

/// Run all die-level checks and aggregate the violations.
pub fn run_die_checks(
    cell: &Cell,
    trace_index: usize,
    frame: &BBox,
    min_clear: f64,
) -> Vec<DrcViolation> {
    let mut violations = check_trace_keepout(cell, trace_index, min_clear);
    violations.extend(check_within_frame(cell, frame));

    for v in &violations {
        match v.severity {
            Severity::Error => log::error!("DRC {}: {}", v.rule_name, v.message),
            Severity::Warning => log::warn!("DRC {}: {}", v.rule_name, v.message),
            Severity::Info => log::info!("DRC {}: {}", v.rule_name, v.message),
        }
    }
    violations
}

/// True when any violation is an error.
pub fn has_errors(violations: &[DrcViolation]) -> bool {
    violations.iter().any(|v| v.severity == Severity::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptlith_core::geometry::{Path, Point, Rect};

    fn trace_cell() -> (Cell, usize) {
        let mut cell = Cell::new("die");
        let idx = cell.add_geometry(GeomPrimitive::Path(Path::new(
            1,
            vec![Point::new(100.0, 100.0), Point::new(300.0, 100.0)],
            20.0,
        )));
        (cell, idx)
    }

    #[test]
    fn test_overlapping_rect_flagged_once() {
        let (mut cell, trace_idx) = trace_cell();
        cell.add_geometry(GeomPrimitive::Rect(Rect::new(1, 150.0, 90.0, 200.0, 120.0)));

        let violations = check_trace_keepout(&cell, trace_idx, 10.0);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].violation_type, ViolationType::Overlap);
        assert_eq!(violations[0].geometry_indices, vec![trace_idx, 1]);
    }

    #[test]
    fn test_close_rect_is_spacing_violation() {
        let (mut cell, trace_idx) = trace_cell();
        // Trace bbox ends at x=310; this rect starts 5 um past it.
        cell.add_geometry(GeomPrimitive::Rect(Rect::new(1, 315.0, 90.0, 400.0, 120.0)));

        let violations = check_trace_keepout(&cell, trace_idx, 10.0);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].violation_type, ViolationType::MinSpacing);
    }

    #[test]
    fn test_clear_rect_passes() {
        let (mut cell, trace_idx) = trace_cell();
        cell.add_geometry(GeomPrimitive::Rect(Rect::new(1, 400.0, 90.0, 500.0, 120.0)));

        assert!(check_trace_keepout(&cell, trace_idx, 10.0).is_empty());
    }

    #[test]
    fn test_paths_and_other_layers_exempt() {
        let (mut cell, trace_idx) = trace_cell();
        // Connecting route touches the trace endpoint.
        cell.add_geometry(GeomPrimitive::Path(Path::new(
            1,
            vec![Point::new(100.0, 100.0), Point::new(50.0, 100.0)],
            20.0,
        )));
        // Same footprint as an overlap, but a different layer.
        cell.add_geometry(GeomPrimitive::Rect(Rect::new(10, 150.0, 90.0, 200.0, 120.0)));

        assert!(check_trace_keepout(&cell, trace_idx, 10.0).is_empty());
    }

    #[test]
    fn test_within_frame() {
        let (mut cell, _) = trace_cell();
        cell.add_geometry(GeomPrimitive::Rect(Rect::new(1, -10.0, 0.0, 50.0, 50.0)));

        let frame = BBox::new(Point::new(0.0, 0.0), Point::new(1500.0, 1500.0));
        let violations = check_within_frame(&cell, &frame);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].violation_type, ViolationType::OutOfBounds);
        assert!(has_errors(&violations));
    }
}
