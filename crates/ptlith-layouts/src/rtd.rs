//! Pt100 RTD sensor die generator.
//!
//! Builds a 1.5 x 1.5 mm die: a platinum meander sense resistor in the
//! center, four Kelvin pads (force/sense per side), routing, alignment
//! crosses, a dicing frame, and pad labels. All dimensions in micrometers.

use ptlith_core::cell::{Cell, CellId};
use ptlith_core::database::LayoutDatabase;
use ptlith_core::geometry::{BBox, GeomPrimitive, Path, Point, Rect, Text};
use ptlith_core::LayerId;

use crate::tech;

/// Geometric parameters of the RTD die. Defaults match the fabricated
/// Pt100 mask set.
#[derive(Debug, Clone)]
pub struct RtdParams {
    pub die_w: f64,
    pub die_h: f64,
    /// Meander line width.
    pub line_width: f64,
    /// Gap between adjacent meander runs.
    pub gap: f64,
    /// Number of horizontal runs.
    pub runs: usize,
    /// Length of one horizontal run.
    pub run_len: f64,
    /// Width of the force routing traces.
    pub route_width: f64,
    /// Bond pad edge length.
    pub pad_size: f64,
    /// Horizontal clearance between meander rail and pad column.
    pub pad_clear: f64,
    /// Frame thickness of the dicing lane marks.
    pub frame_width: f64,
    /// Label character height.
    pub label_height: f64,
    /// Desired length of the sense link rectangles.
    pub sense_len_target: f64,
    /// Minimum clearance between a force rail and the meander.
    pub sense_min_clear: f64,
    /// Vertical offset of the sense links from the pad center.
    pub sense_y_offset: f64,
}

impl Default for RtdParams {
    fn default() -> Self {
        Self {
            die_w: 1500.0,
            die_h: 1500.0,
            line_width: 22.0,
            gap: 15.0,
            runs: 7,
            run_len: 178.0,
            route_width: 20.0,
            pad_size: 150.0,
            pad_clear: 80.0,
            frame_width: 5.0,
            label_height: 120.0,
            sense_len_target: 45.0,
            sense_min_clear: 10.0,
            sense_y_offset: 4.0,
        }
    }
}

impl RtdParams {
    /// Meander pitch: line width plus gap.
    pub fn pitch(&self) -> f64 {
        self.line_width + self.gap
    }

    /// Overall meander height (centerline to centerline plus one line).
    pub fn meander_height(&self) -> f64 {
        (self.runs as f64 - 1.0) * self.pitch() + self.line_width
    }

    /// X coordinates of the two meander rails.
    pub fn rails(&self) -> (f64, f64) {
        let cx = self.die_w / 2.0;
        (cx - self.run_len / 2.0, cx + self.run_len / 2.0)
    }
}

/// A generated RTD die: the database plus handles the checks and the
/// wafer tiler need.
pub struct RtdDie {
    pub db: LayoutDatabase,
    pub cell: CellId,
    /// Geometry index of the meander trace within the die cell.
    pub meander_index: usize,
    pub params: RtdParams,
}

impl RtdDie {
    pub fn frame(&self) -> BBox {
        BBox::new(
            Point::new(0.0, 0.0),
            Point::new(self.params.die_w, self.params.die_h),
        )
    }
}

/// Centerline points of the serpentine: runs alternate left-to-right and
/// right-to-left, stepping up one pitch between runs.
pub fn meander_points(params: &RtdParams) -> Vec<Point> {
    let (left, right) = params.rails();
    let cy = params.die_h / 2.0;
    let y0 = cy - params.meander_height() / 2.0 + params.line_width / 2.0;

    let mut pts = Vec::with_capacity(params.runs * 2);
    let mut y = y0;
    for i in 0..params.runs {
        if i % 2 == 0 {
            pts.push(Point::new(left, y));
            pts.push(Point::new(right, y));
        } else {
            pts.push(Point::new(right, y));
            pts.push(Point::new(left, y));
        }
        if i < params.runs - 1 {
            y += params.pitch();
        }
    }
    pts
}

/// Final sense-link length: the target, shortened if needed so the force
/// rails keep `sense_min_clear` from the meander rails (clamped at zero,
/// symmetric on both sides).
pub fn sense_length(params: &RtdParams) -> f64 {
    let (left, right) = params.rails();
    // Inner edges of the two pad columns.
    let left_pad_edge = left - params.pad_clear;
    let right_pad_edge = right + params.pad_clear;

    let max_left = ((left - params.sense_min_clear) - left_pad_edge).max(0.0);
    let max_right = (right_pad_edge - (right + params.sense_min_clear)).max(0.0);
    params.sense_len_target.min(max_left).min(max_right)
}

fn rect(cell: &mut Cell, layer: LayerId, x: f64, y: f64, w: f64, h: f64) -> usize {
    cell.add_geometry(GeomPrimitive::Rect(Rect::sized(layer, x, y, w, h)))
}

fn path(cell: &mut Cell, layer: LayerId, pts: Vec<Point>, width: f64) -> usize {
    cell.add_geometry(GeomPrimitive::Path(Path::new(layer, pts, width)))
}

fn label(cell: &mut Cell, layer: LayerId, s: &str, x: f64, y: f64, h: f64) {
    cell.add_geometry(GeomPrimitive::Text(Text::new(layer, Point::new(x, y), s, h)));
}

/// Alignment cross: two orthogonal bars centered on (x, y).
fn cross(cell: &mut Cell, layer: LayerId, x: f64, y: f64, arm: f64, stroke: f64) {
    rect(cell, layer, x - arm, y - stroke / 2.0, 2.0 * arm, stroke);
    rect(cell, layer, x - stroke / 2.0, y - arm, stroke, 2.0 * arm);
}

/// Build the complete RTD die.
pub fn build_rtd_die(params: &RtdParams) -> RtdDie {
    let mut db = LayoutDatabase::new("pt100_rtd");
    db.layer_stack = tech::pt100_stack();

    let mut cell = Cell::new("PT100_RTD");

    // ── Dicing frame and alignment crosses ───────────────────────────
    let (w, h, fw) = (params.die_w, params.die_h, params.frame_width);
    rect(&mut cell, tech::DICE, 0.0, 0.0, w, fw);
    rect(&mut cell, tech::DICE, 0.0, h - fw, w, fw);
    rect(&mut cell, tech::DICE, 0.0, 0.0, fw, h);
    rect(&mut cell, tech::DICE, w - fw, 0.0, fw, h);

    for (x, y) in [
        (150.0, 150.0),
        (w - 150.0, 150.0),
        (150.0, h - 150.0),
        (w - 150.0, h - 150.0),
    ] {
        cross(&mut cell, tech::ALIGN, x, y, 100.0, 10.0);
    }

    // ── Meander ──────────────────────────────────────────────────────
    let pts = meander_points(params);
    let (left, right) = params.rails();
    let cy = params.die_h / 2.0;
    let y0 = cy - params.meander_height() / 2.0 + params.line_width / 2.0;
    let start = Point::new(left, y0);
    let end_x = if params.runs % 2 == 1 { right } else { left };
    let end = Point::new(end_x, y0 + (params.runs as f64 - 1.0) * params.pitch());
    let meander_index = path(&mut cell, tech::METAL, pts, params.line_width);

    // ── Kelvin pads, two symmetric rows ──────────────────────────────
    // Left column: lower = S-, upper = F-. Right column: lower = F+, upper = S+.
    let pad = params.pad_size;
    let pad_l_x = left - params.pad_clear - pad;
    let pad_r_x = right + params.pad_clear;
    let pad_y_low = cy - pad - 40.0;
    let pad_y_high = cy + 40.0;

    for (px, py) in [
        (pad_l_x, pad_y_low),
        (pad_l_x, pad_y_high),
        (pad_r_x, pad_y_low),
        (pad_r_x, pad_y_high),
    ] {
        rect(&mut cell, tech::METAL, px, py, pad, pad);
    }

    let left_edge = pad_l_x + pad; // right edge of the left pad column
    let right_edge = pad_r_x; // left edge of the right pad column

    // ── Force routing around vertical rails outside the meander ──────
    let sense_len = sense_length(params);
    let rail_l = left_edge + sense_len;
    let rail_r = right_edge - sense_len;

    // F-: meander start, out to the left rail, up to the F- pad center.
    path(
        &mut cell,
        tech::METAL,
        vec![
            start,
            Point::new(rail_l, start.y),
            Point::new(rail_l, pad_y_high + pad / 2.0),
            Point::new(left_edge, pad_y_high + pad / 2.0),
        ],
        params.route_width,
    );
    // F+: meander end, out to the right rail, down to the F+ pad center.
    path(
        &mut cell,
        tech::METAL,
        vec![
            end,
            Point::new(rail_r, end.y),
            Point::new(rail_r, pad_y_low + pad / 2.0),
            Point::new(right_edge, pad_y_low + pad / 2.0),
        ],
        params.route_width,
    );

    // ── Sense links from the sense pad edges toward the meander ──────
    let y_sm = pad_y_low + pad / 2.0 + params.sense_y_offset;
    let y_sp = pad_y_high + pad / 2.0 - params.sense_y_offset;
    if sense_len > 0.0 {
        rect(
            &mut cell,
            tech::METAL,
            left_edge,
            y_sm - params.route_width / 2.0,
            sense_len,
            params.route_width,
        );
        rect(
            &mut cell,
            tech::METAL,
            right_edge - sense_len,
            y_sp - params.route_width / 2.0,
            sense_len,
            params.route_width,
        );
    }

    // ── Pad labels ───────────────────────────────────────────────────
    let lh = params.label_height;
    label(&mut cell, tech::LABEL, "Sm", pad_l_x + pad / 2.0, pad_y_low + pad / 2.0, lh);
    label(&mut cell, tech::LABEL, "Fm", pad_l_x + pad / 2.0, pad_y_high + pad / 2.0, lh);
    label(&mut cell, tech::LABEL, "Fp", pad_r_x + pad / 2.0, pad_y_low + pad / 2.0, lh);
    label(&mut cell, tech::LABEL, "Sp", pad_r_x + pad / 2.0, pad_y_high + pad / 2.0, lh);

    log::info!(
        "RTD die: {} runs of {} um at pitch {} um, sense links {} um",
        params.runs,
        params.run_len,
        params.pitch(),
        sense_len
    );

    let cell_id = db.add_cell(cell);
    RtdDie {
        db,
        cell: cell_id,
        meander_index,
        params: params.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptlith_drc::{has_errors, run_die_checks};

    #[test]
    fn test_meander_alternates_between_rails() {
        let params = RtdParams::default();
        let pts = meander_points(&params);
        let (left, right) = params.rails();

        assert_eq!(pts.len(), params.runs * 2);
        for pair in pts.chunks_exact(2) {
            // Each run spans exactly the two rails, in either direction.
            let xs = [pair[0].x, pair[1].x];
            assert!(xs.contains(&left), "run does not touch left rail: {:?}", pair);
            assert!(xs.contains(&right), "run does not touch right rail: {:?}", pair);
            assert!((pair[0].y - pair[1].y).abs() < 1e-12);
        }
        for (i, w) in pts.windows(2).enumerate() {
            // Consecutive points share either x (rail hop) or y (run).
            let same_x = (w[0].x - w[1].x).abs() < 1e-12;
            let same_y = (w[0].y - w[1].y).abs() < 1e-12;
            assert!(same_x || same_y, "diagonal segment at {}", i);
        }
    }

    #[test]
    fn test_meander_length() {
        let params = RtdParams::default();
        let die = build_rtd_die(&params);
        let cell = die.db.get_cell(&die.cell).unwrap();
        let expected =
            params.runs as f64 * params.run_len + (params.runs as f64 - 1.0) * params.pitch();

        match &cell.geometries[die.meander_index] {
            GeomPrimitive::Path(p) => {
                assert!((p.length() - expected).abs() < 1e-9);
                assert!((p.width - params.line_width).abs() < 1e-12);
            }
            other => panic!("expected meander path, got {:?}", other),
        }
    }

    #[test]
    fn test_sense_length_default_and_clamped() {
        let params = RtdParams::default();
        assert!((sense_length(&params) - params.sense_len_target).abs() < 1e-12);

        // Pads tight against the meander: the link shortens but never
        // goes negative, and the rails keep the minimum clearance.
        let tight = RtdParams {
            pad_clear: 20.0,
            ..RtdParams::default()
        };
        let len = sense_length(&tight);
        assert!(len >= 0.0);
        assert!(len < tight.sense_len_target);
        let (left, _) = tight.rails();
        let rail_l = (left - tight.pad_clear) + len;
        assert!(rail_l <= left - tight.sense_min_clear + 1e-12);

        let impossible = RtdParams {
            pad_clear: 5.0,
            ..RtdParams::default()
        };
        assert_eq!(sense_length(&impossible), 0.0);
    }

    #[test]
    fn test_default_die_passes_drc() {
        let die = build_rtd_die(&RtdParams::default());
        let cell = die.db.get_cell(&die.cell).unwrap();
        let violations = run_die_checks(
            cell,
            die.meander_index,
            &die.frame(),
            die.params.sense_min_clear,
        );
        assert!(!has_errors(&violations), "violations: {:?}", violations);
    }

    #[test]
    fn test_die_contents() {
        let die = build_rtd_die(&RtdParams::default());
        let cell = die.db.get_cell(&die.cell).unwrap();

        // 4 frame rects, 8 cross bars, 4 pads, 2 sense links on their layers.
        assert_eq!(cell.geometries_on_layer(tech::DICE).len(), 4);
        assert_eq!(cell.geometries_on_layer(tech::ALIGN).len(), 8);
        assert_eq!(cell.geometries_on_layer(tech::LABEL).len(), 4);

        let labels: Vec<String> = cell
            .geometries
            .iter()
            .filter_map(|g| match g {
                GeomPrimitive::Text(t) => Some(t.string.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["Sm", "Fm", "Fp", "Sp"]);

        // Everything fits in the die.
        let bb = cell.local_bbox().unwrap();
        assert!(bb.min.x >= 0.0 && bb.min.y >= 0.0);
        assert!(bb.max.x <= 1500.0 && bb.max.y <= 1500.0);
    }
}
