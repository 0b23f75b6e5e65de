//! # Ptlith figures
//!
//! Rendering of the explanatory figures that accompany the mask set:
//! MOSCAP fabrication cross-sections, the Nernst-limit sensor comparison
//! chart, the symbolic signal-chain diagram, and bitmap previews of
//! generated layouts. All drawing goes through `plotters`.

use thiserror::Error;

pub mod charts;
pub mod frame;
pub mod preview;
pub mod process;
pub mod signal_chain;

pub use charts::render_nernst_chart;
pub use frame::FigureFrame;
pub use preview::render_preview;
pub use process::{moscap_steps, render_moscap_steps, ProcessStep, StepFlags};
pub use signal_chain::render_signal_chain;

#[derive(Debug, Error)]
pub enum FigureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("plot error: {0}")]
    Plot(String),
    #[error("nothing to render: {0}")]
    Layout(String),
}

/// Plotters error types are generic over the backend; flatten them into a
/// message at the boundary.
pub(crate) fn plot_err<E: std::fmt::Debug>(e: E) -> FigureError {
    FigureError::Plot(format!("{:?}", e))
}
