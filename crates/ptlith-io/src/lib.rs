//! # Ptlith I/O
//!
//! GDS-II stream reader and writer plus file-level helpers. Photomask
//! geometry leaves this workspace exclusively as GDS-II; the reader exists
//! so one generated die file can be instanced into the next layout
//! (RTD die into electrode die, die into wafer).

pub mod gds;

pub use gds::{
    read_gds_file, read_gds_into, write_gds_file, GdsError, GdsReader, GdsWriter,
};
