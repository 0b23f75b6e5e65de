//! Wafer-level tiling: step a die cell across a circular wafer and keep
//! every placement whose full footprint stays inside the wafer edge.

use serde::Serialize;
use thiserror::Error;

use ptlith_core::cell::{Cell, CellId, CellInstance, Transform};
use ptlith_core::database::LayoutDatabase;
use ptlith_core::geometry::{GeomPrimitive, Point, Polygon, Text};
use ptlith_core::layer::{FillPattern, Layer};

use crate::tech;

pub const WAFER_CELL: &str = "WAFER_100MM";

#[derive(Debug, Error)]
pub enum WaferError {
    #[error("die cell '{0}' not found in database")]
    UnknownDieCell(String),
}

/// Tiling parameters. Defaults describe a 100 mm wafer.
#[derive(Debug, Clone)]
pub struct WaferParams {
    /// Wafer diameter in micrometers.
    pub diameter: f64,
    /// Extra exclusion ring inside the physical edge.
    pub edge_clear: f64,
    /// Vertex count of the outline polygon.
    pub outline_segments: usize,
    pub label_height: f64,
    /// Distance of the die-count label from the wafer edge.
    pub label_margin: f64,
}

impl Default for WaferParams {
    fn default() -> Self {
        Self {
            diameter: 100_000.0,
            edge_clear: 0.0,
            outline_segments: 512,
            label_height: 500.0,
            label_margin: 2000.0,
        }
    }
}

/// Summary of a tiling run, serializable for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct TilingReport {
    pub placed: usize,
    pub rejected: usize,
    pub radius: f64,
    pub die_w: f64,
    pub die_h: f64,
}

/// True when all four corners of the `w` x `h` rectangle at `(x, y)` lie
/// inside a circle of radius `r` centered on the origin.
pub fn fits_in_circle(x: f64, y: f64, w: f64, h: f64, r: f64) -> bool {
    let r2 = r * r;
    [(x, y), (x + w, y), (x, y + h), (x + w, y + h)]
        .iter()
        .all(|(cx, cy)| cx * cx + cy * cy <= r2)
}

/// Tile `die_cell` across the wafer on a rectangular grid centered on the
/// wafer origin. The grid is laid out in footprint coordinates;
/// `origin_offset` is where the die footprint's lower-left corner sits
/// relative to the cell origin, so cells whose geometry is not anchored at
/// (0, 0) still land on the grid.
///
/// Creates the wafer top cell with an outline polygon, one reference per
/// accepted grid site, and a die-count annotation, then makes it the top
/// cell of the database.
pub fn tile_wafer(
    db: &mut LayoutDatabase,
    die_cell: CellId,
    die_w: f64,
    die_h: f64,
    origin_offset: Point,
    params: &WaferParams,
) -> Result<TilingReport, WaferError> {
    let die_name = db
        .get_cell(&die_cell)
        .map(|c| c.name.clone())
        .ok_or_else(|| WaferError::UnknownDieCell(format!("{:?}", die_cell)))?;

    register_wafer_layers(db);

    let radius = params.diameter / 2.0 - params.edge_clear;
    let mut wafer = Cell::new(WAFER_CELL);
    wafer.add_geometry(GeomPrimitive::Polygon(Polygon::circle(
        tech::OUTLINE,
        Point::new(0.0, 0.0),
        radius,
        params.outline_segments,
    )));

    let mut placed = 0usize;
    let mut rejected = 0usize;

    let mut y = (-radius / die_h).floor() * die_h;
    while y <= radius {
        let mut x = (-radius / die_w).floor() * die_w;
        while x <= radius {
            if fits_in_circle(x, y, die_w, die_h, radius) {
                wafer.add_instance(CellInstance::new(
                    die_cell,
                    &die_name,
                    Transform::translate(x - origin_offset.x, y - origin_offset.y),
                ));
                placed += 1;
            } else {
                rejected += 1;
            }
            x += die_w;
        }
        y += die_h;
    }

    wafer.add_geometry(GeomPrimitive::Text(Text::new(
        tech::WAFER_TEXT,
        Point::new(-radius + params.label_margin, radius - params.label_margin),
        &format!("{placed} dies"),
        params.label_height,
    )));

    log::info!(
        "wafer tiling: {} x {} um die, {} placed, {} rejected",
        die_w,
        die_h,
        placed,
        rejected
    );

    let wafer_id = db.add_cell(wafer);
    db.top_cell = Some(wafer_id);

    Ok(TilingReport {
        placed,
        rejected,
        radius,
        die_w,
        die_h,
    })
}

/// Make sure the wafer-only layers exist in the target database, which may
/// have been read from a file that never used them.
fn register_wafer_layers(db: &mut LayoutDatabase) {
    if db.layer_stack.get_layer(tech::OUTLINE).is_none() {
        db.layer_stack.add_layer(
            Layer::new(tech::OUTLINE, "outline", tech::OUTLINE as u16, 0)
                .with_color(90, 90, 90)
                .with_pattern(FillPattern::Outline)
                .with_description("wafer outline"),
        );
    }
    if db.layer_stack.get_layer(tech::WAFER_TEXT).is_none() {
        db.layer_stack.add_layer(
            Layer::new(tech::WAFER_TEXT, "wafer_text", tech::WAFER_TEXT as u16, 0)
                .with_color(40, 40, 40)
                .with_description("wafer annotations"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtd::{build_rtd_die, RtdParams};

    #[test]
    fn test_fits_in_circle_corners() {
        // A die whose far corner sits exactly on the circle is accepted.
        let r = 5.0_f64;
        assert!(fits_in_circle(0.0, 0.0, 3.0, 4.0, r));
        assert!(!fits_in_circle(0.0, 0.0, 3.0, 4.01, r));
        // Centered footprint, symmetric corners.
        assert!(fits_in_circle(-3.0, -3.0, 6.0, 6.0, 4.5));
        assert!(!fits_in_circle(-3.0, -3.0, 6.0, 6.0, 4.0));
    }

    #[test]
    fn test_tile_rtd_die() {
        let mut die = build_rtd_die(&RtdParams::default());
        let params = WaferParams::default();
        let report =
            tile_wafer(&mut die.db, die.cell, 1500.0, 1500.0, Point::new(0.0, 0.0), &params)
                .unwrap();

        // ~3490 dies fit a 100 mm wafer at 1.5 mm pitch; the corner test
        // trims the edge ring but not much more.
        assert!(report.placed > 3000, "placed = {}", report.placed);
        assert!(report.rejected > 0);
        assert_eq!(report.radius, 50_000.0);

        let top = die.db.top_cell().unwrap();
        assert_eq!(top.name, WAFER_CELL);
        assert_eq!(top.instance_count(), report.placed);

        // Every placement footprint stays inside the wafer.
        for inst in &top.instances {
            let (x, y) = (inst.transform.offset.x, inst.transform.offset.y);
            assert!(fits_in_circle(x, y, 1500.0, 1500.0, report.radius));
        }

        let label = top
            .geometries
            .iter()
            .find_map(|g| match g {
                GeomPrimitive::Text(t) => Some(t.string.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(label, format!("{} dies", report.placed));
    }

    #[test]
    fn test_origin_offset_shifts_placements() {
        let mut die = build_rtd_die(&RtdParams::default());
        // A cell whose footprint corner sits at (-750, -750) relative to
        // its origin gets placed shifted by (+750, +750) off the grid.
        let report = tile_wafer(
            &mut die.db,
            die.cell,
            1500.0,
            1500.0,
            Point::new(-750.0, -750.0),
            &WaferParams::default(),
        )
        .unwrap();
        assert!(report.placed > 3000);

        let top = die.db.top_cell().unwrap();
        for inst in &top.instances {
            let x = inst.transform.offset.x;
            assert!(((x - 750.0) / 1500.0).fract().abs() < 1e-9, "x = {}", x);
        }
    }

    #[test]
    fn test_edge_clearance_shrinks_outline_and_grid() {
        let mut die = build_rtd_die(&RtdParams::default());
        let params = WaferParams {
            edge_clear: 5_000.0,
            ..WaferParams::default()
        };
        let report =
            tile_wafer(&mut die.db, die.cell, 1500.0, 1500.0, Point::new(0.0, 0.0), &params)
                .unwrap();
        assert_eq!(report.radius, 45_000.0);

        // The outline circle shrinks with the exclusion ring too.
        let top = die.db.top_cell().unwrap();
        let outline = top
            .geometries
            .iter()
            .find_map(|g| match g {
                GeomPrimitive::Polygon(p) if p.layer_id == tech::OUTLINE => p.bbox(),
                _ => None,
            })
            .unwrap();
        assert!((outline.max.x - 45_000.0).abs() < 1.0);

        for inst in &top.instances {
            let (x, y) = (inst.transform.offset.x, inst.transform.offset.y);
            assert!(fits_in_circle(x, y, 1500.0, 1500.0, report.radius));
        }
    }

    #[test]
    fn test_unknown_die_cell() {
        let mut db = LayoutDatabase::new("empty");
        let bogus = uuid_like_missing_id(&db);
        let err = tile_wafer(
            &mut db,
            bogus,
            1500.0,
            1500.0,
            Point::new(0.0, 0.0),
            &WaferParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, WaferError::UnknownDieCell(_)));
    }

    fn uuid_like_missing_id(_db: &LayoutDatabase) -> CellId {
        Cell::new("throwaway").id
    }

    #[test]
    fn test_registers_wafer_layers() {
        let mut die = build_rtd_die(&RtdParams::default());
        die.db.layer_stack = Default::default();
        tile_wafer(
            &mut die.db,
            die.cell,
            1500.0,
            1500.0,
            Point::new(0.0, 0.0),
            &WaferParams::default(),
        )
        .unwrap();
        assert!(die.db.layer_stack.get_layer(tech::OUTLINE).is_some());
        assert!(die.db.layer_stack.get_layer(tech::WAFER_TEXT).is_some());
    }
}
