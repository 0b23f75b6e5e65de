//! # Ptlith Core
//!
//! Core layout database for photomask generation: geometric primitives,
//! hierarchical cells with name-resolved instances, a technology layer
//! stack, and an R-tree spatial index.
//!
//! Coordinates are micrometers throughout; conversion to integer database
//! units happens only at the GDS boundary (`ptlith-io`).

pub mod cell;
pub mod database;
pub mod geometry;
pub mod layer;
pub mod spatial;

pub use cell::{Cell, CellInstance, Transform};
pub use database::{DatabaseError, LayoutDatabase};
pub use geometry::{BBox, GeomPrimitive, Path, Point, Polygon, Rect, Text};
pub use layer::{Layer, LayerId, LayerStack};
