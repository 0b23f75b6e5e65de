//! # Ptlith layouts
//!
//! Mask generators for the Pt100 platinum RTD project: the sensor die
//! itself, the merge of that die into an electrode carrier, and wafer-level
//! tiling. All coordinates are micrometers; output goes through the GDS-II
//! writer in `ptlith-io`.

pub mod electrodes;
pub mod rtd;
pub mod tech;
pub mod wafer;

pub use electrodes::{merge_databases, merge_rtd_into_electrodes, MergeError, MergeParams, MergeReport};
pub use rtd::{build_rtd_die, RtdDie, RtdParams};
pub use wafer::{fits_in_circle, tile_wafer, TilingReport, WaferError, WaferParams};
