use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{BBox, GeomPrimitive, Point};
use crate::LayerId;

/// Unique cell identifier.
pub type CellId = Uuid;

/// A transformation for placing subcell instances.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transform {
    /// Translation offset.
    pub offset: Point,
    /// Rotation in degrees (0, 90, 180, 270).
    pub rotation: f64,
    /// Mirror about X axis.
    pub mirror_x: bool,
    /// Uniform scale factor (typically 1.0).
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            offset: Point::new(0.0, 0.0),
            rotation: 0.0,
            mirror_x: false,
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            offset: Point::new(x, y),
            ..Default::default()
        }
    }

    pub fn apply(&self, point: &Point) -> Point {
        let mut p = *point;

        p.x *= self.scale;
        p.y *= self.scale;

        if self.mirror_x {
            p.y = -p.y;
        }

        let rad = self.rotation.to_radians();
        let cos_r = rad.cos();
        let sin_r = rad.sin();
        let rx = p.x * cos_r - p.y * sin_r;
        let ry = p.x * sin_r + p.y * cos_r;

        Point::new(rx + self.offset.x, ry + self.offset.y)
    }
}

/// A reference to a subcell placed within a parent cell.
///
/// Instances read from a GDS stream carry only the referenced cell's name
/// (the SREF SNAME record); `cell_id` stays nil until
/// `LayoutDatabase::resolve_instances` links it up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellInstance {
    pub id: Uuid,
    pub cell_id: CellId,
    /// Name of the referenced cell.
    pub cell_name: String,
    pub transform: Transform,
}

impl CellInstance {
    pub fn new(cell_id: CellId, cell_name: &str, transform: Transform) -> Self {
        Self {
            id: Uuid::new_v4(),
            cell_id,
            cell_name: cell_name.to_string(),
            transform,
        }
    }

    /// An instance known only by cell name, to be resolved later.
    pub fn by_name(cell_name: &str, transform: Transform) -> Self {
        Self::new(Uuid::nil(), cell_name, transform)
    }
}

/// A layout cell containing geometric primitives and subcell references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub name: String,
    pub geometries: Vec<GeomPrimitive>,
    pub instances: Vec<CellInstance>,
}

impl Cell {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            geometries: Vec::new(),
            instances: Vec::new(),
        }
    }

    /// Add a geometry primitive, returning its index in the cell.
    pub fn add_geometry(&mut self, geom: GeomPrimitive) -> usize {
        self.geometries.push(geom);
        self.geometries.len() - 1
    }

    pub fn add_instance(&mut self, instance: CellInstance) {
        self.instances.push(instance);
    }

    /// Compute the bounding box of all geometry in this cell (not including subcells).
    pub fn local_bbox(&self) -> Option<BBox> {
        let mut result: Option<BBox> = None;
        for bb in self.geometries.iter().filter_map(|g| g.bbox()) {
            result = Some(match result {
                Some(acc) => acc.union(&bb),
                None => bb,
            });
        }
        result
    }

    /// Get all geometries on a specific layer, with their indices.
    pub fn geometries_on_layer(&self, layer_id: LayerId) -> Vec<(usize, &GeomPrimitive)> {
        self.geometries
            .iter()
            .enumerate()
            .filter(|(_, g)| g.layer_id() == layer_id)
            .collect()
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn test_cell_add_geometry() {
        let mut cell = Cell::new("test_cell");
        let idx = cell.add_geometry(GeomPrimitive::Rect(Rect::new(0, 0.0, 0.0, 100.0, 50.0)));
        assert_eq!(idx, 0);
        assert_eq!(cell.geometry_count(), 1);
    }

    #[test]
    fn test_cell_bbox() {
        let mut cell = Cell::new("test_cell");
        cell.add_geometry(GeomPrimitive::Rect(Rect::new(0, 0.0, 0.0, 100.0, 50.0)));
        cell.add_geometry(GeomPrimitive::Rect(Rect::new(1, 50.0, 25.0, 200.0, 75.0)));
        let bb = cell.local_bbox().unwrap();
        assert!((bb.min.x - 0.0).abs() < 1e-10);
        assert!((bb.min.y - 0.0).abs() < 1e-10);
        assert!((bb.max.x - 200.0).abs() < 1e-10);
        assert!((bb.max.y - 75.0).abs() < 1e-10);
    }

    #[test]
    fn test_transform_translate() {
        let t = Transform::translate(10.0, 20.0);
        let p = Point::new(5.0, 5.0);
        let result = t.apply(&p);
        assert!((result.x - 15.0).abs() < 1e-10);
        assert!((result.y - 25.0).abs() < 1e-10);
    }

    #[test]
    fn test_transform_mirror() {
        let t = Transform {
            mirror_x: true,
            ..Default::default()
        };
        let p = t.apply(&Point::new(3.0, 4.0));
        assert!((p.x - 3.0).abs() < 1e-10);
        assert!((p.y + 4.0).abs() < 1e-10);
    }
}
