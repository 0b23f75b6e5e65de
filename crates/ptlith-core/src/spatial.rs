use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::{BBox, Point};

/// An entry in the R-tree spatial index, referencing a geometry by its index.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    /// Index into the cell's geometry vector.
    pub geometry_index: usize,
    /// Bounding box of the geometry.
    pub bbox: BBox,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min.x, self.bbox.min.y],
            [self.bbox.max.x, self.bbox.max.y],
        )
    }
}

/// Spatial index for clearance queries over a cell's geometry.
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            tree: RTree::new(),
        }
    }

    /// Build the index from a list of geometry bounding boxes.
    pub fn build(entries: Vec<SpatialEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Insert a single entry.
    pub fn insert(&mut self, entry: SpatialEntry) {
        self.tree.insert(entry);
    }

    /// Find all entries whose bounding box contains the given point.
    /// A point is a degenerate region, so this shares the envelope walk
    /// with `query_region`.
    pub fn query_point(&self, point: &Point) -> Vec<&SpatialEntry> {
        self.query_region(&BBox::new(*point, *point))
    }

    /// Find all entries that intersect with the given region.
    pub fn query_region(&self, region: &BBox) -> Vec<&SpatialEntry> {
        let envelope = AABB::from_corners(
            [region.min.x, region.min.y],
            [region.max.x, region.max.y],
        );
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .collect()
    }

    /// Find all entries whose bounding box comes within `margin` of the
    /// given region. Clearance checks filter the candidates by exact
    /// separation afterwards.
    pub fn query_clearance(&self, region: &BBox, margin: f64) -> Vec<&SpatialEntry> {
        self.query_region(&region.inflate(margin))
    }

    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}
