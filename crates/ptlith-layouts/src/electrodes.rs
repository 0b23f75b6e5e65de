//! Merge the RTD sensor die into an electrode carrier die.
//!
//! The electrode die comes from a separate mask set as a GDS file; its
//! geometry is anchored with the die's right edge at x = 0 and the
//! vertical center at y = 0. The RTD cell is copied in and referenced at
//! fixed target positions so the meander center lands on each electrode
//! site.

use std::path::Path as FsPath;

use thiserror::Error;

use ptlith_core::cell::{CellInstance, Transform};
use ptlith_core::database::LayoutDatabase;
use ptlith_core::geometry::Point;

use ptlith_io::gds::GdsError;
use ptlith_io::{read_gds_file, read_gds_into, write_gds_file};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Gds(#[from] GdsError),
    #[error("electrode database has no top cell")]
    MissingTopCell,
    #[error("no cells were merged from the sensor database")]
    NoNewCells,
}

/// Placement parameters for the electrode merge. Defaults match the
/// fabricated electrode die.
#[derive(Debug, Clone)]
pub struct MergeParams {
    /// Preferred name of the sensor cell in the incoming database.
    pub rtd_cell_name: String,
    /// Center of the sensor meander in the sensor cell's coordinates.
    pub rtd_center: Point,
    /// Electrode sites, in electrode-die coordinates, where the sensor
    /// center should land.
    pub targets: Vec<Point>,
    /// Electrode die footprint, used by wafer tiling.
    pub die_w: f64,
    pub die_h: f64,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            rtd_cell_name: "PT100_RTD".to_string(),
            rtd_center: Point::new(750.0, 750.0),
            targets: vec![Point::new(-5400.0, 0.0), Point::new(-1000.0, 0.0)],
            die_w: 7760.0,
            die_h: 4550.0,
        }
    }
}

impl MergeParams {
    /// Lower-left corner of the electrode die footprint relative to the
    /// cell origin, for wafer tiling.
    pub fn origin_offset(&self) -> Point {
        Point::new(-self.die_w, -self.die_h / 2.0)
    }
}

/// Outcome of a merge, for logging and reporting.
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// Name of the sensor cell that was placed.
    pub rtd_cell: String,
    pub placements: usize,
}

/// Merge `rtd_db` into `elec_db` and reference the sensor cell at every
/// target site in the electrode top cell.
///
/// The sensor cell is looked up by `rtd_cell_name`; if the incoming
/// database does not contain that name (or the name collided with an
/// existing electrode cell and was skipped), the incoming top cell is
/// used instead.
pub fn merge_databases(
    elec_db: &mut LayoutDatabase,
    rtd_db: LayoutDatabase,
    params: &MergeParams,
) -> Result<MergeReport, MergeError> {
    let top_id = elec_db.top_cell.ok_or(MergeError::MissingTopCell)?;
    let rtd_top_name = rtd_db.top_cell().map(|c| c.name.clone());

    let added = elec_db.merge_from(rtd_db);
    if added.is_empty() {
        return Err(MergeError::NoNewCells);
    }

    let (rtd_id, rtd_name) = match elec_db.find_cell_id_by_name(&params.rtd_cell_name) {
        Some(id) => (id, params.rtd_cell_name.clone()),
        None => {
            let fallback = rtd_top_name
                .and_then(|n| elec_db.find_cell_id_by_name(&n).map(|id| (id, n)))
                .or_else(|| {
                    added.first().and_then(|id| {
                        elec_db.get_cell(id).map(|c| (*id, c.name.clone()))
                    })
                });
            match fallback {
                Some(pair) => pair,
                None => return Err(MergeError::NoNewCells),
            }
        }
    };
    log::info!(
        "placing sensor cell '{}' at {} electrode sites",
        rtd_name,
        params.targets.len()
    );

    let instances: Vec<CellInstance> = params
        .targets
        .iter()
        .map(|target| {
            let dx = target.x - params.rtd_center.x;
            let dy = target.y - params.rtd_center.y;
            CellInstance::new(rtd_id, &rtd_name, Transform::translate(dx, dy))
        })
        .collect();

    let top = elec_db
        .get_cell_mut(&top_id)
        .ok_or(MergeError::MissingTopCell)?;
    let placements = instances.len();
    for inst in instances {
        top.add_instance(inst);
    }

    elec_db.resolve_instances().map_err(GdsError::from)?;
    Ok(MergeReport {
        rtd_cell: rtd_name,
        placements,
    })
}

/// File-based merge: read both GDS files, merge, and write the result.
pub fn merge_rtd_into_electrodes(
    electrode_path: &FsPath,
    rtd_path: &FsPath,
    output_path: &FsPath,
    params: &MergeParams,
) -> Result<MergeReport, MergeError> {
    let mut elec_db = read_gds_file(electrode_path)?;
    let rtd_db = read_gds_file(rtd_path)?;
    let report = merge_databases(&mut elec_db, rtd_db, params)?;
    write_gds_file(&elec_db, output_path)?;
    Ok(report)
}

/// Merge an additional GDS file into an existing database without
/// placing references, for layouts carried alongside the electrode die.
pub fn import_gds(db: &mut LayoutDatabase, path: &FsPath) -> Result<usize, MergeError> {
    let added = read_gds_into(db, path)?;
    Ok(added.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtd::{build_rtd_die, RtdParams};
    use ptlith_core::cell::Cell;
    use ptlith_core::geometry::{GeomPrimitive, Rect};

    fn electrode_db() -> LayoutDatabase {
        let mut db = LayoutDatabase::new("electrodes");
        let mut cell = Cell::new("ELECTRODE_DIE");
        cell.add_geometry(GeomPrimitive::Rect(Rect::new(
            1, -7760.0, -2275.0, 0.0, 2275.0,
        )));
        db.add_cell(cell);
        db
    }

    #[test]
    fn test_merge_places_sensors_at_targets() {
        let mut elec = electrode_db();
        let die = build_rtd_die(&RtdParams::default());
        let params = MergeParams::default();

        let report = merge_databases(&mut elec, die.db, &params).unwrap();
        assert_eq!(report.rtd_cell, "PT100_RTD");
        assert_eq!(report.placements, 2);

        let top = elec.top_cell().unwrap();
        assert_eq!(top.instance_count(), 2);
        let offsets: Vec<(f64, f64)> = top
            .instances
            .iter()
            .map(|i| (i.transform.offset.x, i.transform.offset.y))
            .collect();
        // Sensor center (750, 750) lands on (-5400, 0) and (-1000, 0).
        assert_eq!(offsets, vec![(-6150.0, -750.0), (-1750.0, -750.0)]);
    }

    #[test]
    fn test_merge_falls_back_to_incoming_top_cell() {
        let mut elec = electrode_db();
        let mut rtd_db = LayoutDatabase::new("sensor");
        rtd_db.add_cell(Cell::new("SOME_OTHER_NAME"));

        let report =
            merge_databases(&mut elec, rtd_db, &MergeParams::default()).unwrap();
        assert_eq!(report.rtd_cell, "SOME_OTHER_NAME");
        assert_eq!(report.placements, 2);
    }

    #[test]
    fn test_merge_requires_top_cell() {
        let mut elec = LayoutDatabase::new("empty");
        let die = build_rtd_die(&RtdParams::default());
        let err = merge_databases(&mut elec, die.db, &MergeParams::default()).unwrap_err();
        assert!(matches!(err, MergeError::MissingTopCell));
    }

    #[test]
    fn test_merge_rejects_fully_colliding_input() {
        let mut elec = electrode_db();
        let mut rtd_db = LayoutDatabase::new("sensor");
        rtd_db.add_cell(Cell::new("ELECTRODE_DIE"));

        let err = merge_databases(&mut elec, rtd_db, &MergeParams::default()).unwrap_err();
        assert!(matches!(err, MergeError::NoNewCells));
    }

    #[test]
    fn test_origin_offset() {
        let params = MergeParams::default();
        let off = params.origin_offset();
        assert_eq!((off.x, off.y), (-7760.0, -2275.0));
    }

    #[test]
    fn test_footprint_drives_wafer_tiling() {
        use crate::wafer::{tile_wafer, WaferParams};

        let mut elec = electrode_db();
        let die = build_rtd_die(&RtdParams::default());
        let params = MergeParams::default();
        merge_databases(&mut elec, die.db, &params).unwrap();

        let merged_top = elec.top_cell.unwrap();
        let report = tile_wafer(
            &mut elec,
            merged_top,
            params.die_w,
            params.die_h,
            params.origin_offset(),
            &WaferParams::default(),
        )
        .unwrap();
        assert!(report.placed > 0);

        // The right-edge anchor shifts every reference by (+w, +h/2) off
        // the footprint grid, keeping cell origins on die-pitch multiples.
        let wafer = elec.top_cell().unwrap();
        for inst in &wafer.instances {
            let x = inst.transform.offset.x;
            let y = inst.transform.offset.y - params.die_h / 2.0;
            assert!((x / params.die_w).fract().abs() < 1e-9, "x = {}", x);
            assert!((y / params.die_h).fract().abs() < 1e-9, "y = {}", y);
        }
    }
}
