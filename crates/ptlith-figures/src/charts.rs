//! Sensor response charts.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::{plot_err, FigureError};

const PH_VALUES: [f64; 4] = [4.0, 6.0, 8.0, 10.0];
/// Room-temperature Nernst limit, mV per pH unit.
const NERNST_SLOPE: f64 = 59.0;
/// Effective slope after 100 charge-accumulation cycles.
const CCD_SLOPE: f64 = 240.0;

fn response(slope: f64) -> Vec<(f64, f64)> {
    // Output referenced to the pH 4 baseline.
    PH_VALUES.iter().map(|ph| (*ph, (ph - 4.0) * slope)).collect()
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    y_max: f64,
    series: &[(&str, f64, RGBColor)],
    annotation: Option<&str>,
) -> Result<(), FigureError> {
    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 26))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(65)
        .build_cartesian_2d(3.5..10.5, 0.0..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("pH value")
        .y_desc("Output voltage (mV)")
        .x_labels(4)
        .light_line_style(RGBColor(220, 220, 220))
        .draw()
        .map_err(plot_err)?;

    for (name, slope, color) in series {
        let points = response(*slope);
        let color = *color;
        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
            .map_err(plot_err)?
            .label(*name)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
        chart
            .draw_series(points.iter().map(|p| Circle::new(*p, 4, color.filled())))
            .map_err(plot_err)?;
    }

    if let Some(text) = annotation {
        chart
            .draw_series(std::iter::once(Text::new(
                text.to_string(),
                (6.2, y_max * 0.77),
                ("sans-serif", 18).into_font().color(&BLUE),
            )))
            .map_err(plot_err)?;
    }

    if series.len() > 1 {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .draw()
            .map_err(plot_err)?;
    }

    Ok(())
}

/// Nernst-limit comparison chart: an ISFET pinned to ~59 mV/pH next to a
/// charge-accumulating CCD readout reaching ~240 mV/pH over 100 cycles.
pub fn render_nernst_chart(path: &Path) -> Result<(), FigureError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let root = BitMapBackend::new(path, (1500, 650)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let root = root
        .titled(
            "Comparison: Nernst-limited ISFET vs CCD-based pH sensor",
            ("sans-serif", 30),
        )
        .map_err(plot_err)?;

    let panels = root.split_evenly((1, 2));
    draw_panel(
        &panels[0],
        "(a) Nernst-limited ISFET",
        260.0,
        &[("ISFET", NERNST_SLOPE, BLUE)],
        Some("~59 mV/pH (Nernst limit)"),
    )?;
    draw_panel(
        &panels[1],
        "(b) CCD with accumulation cycles",
        1500.0,
        &[
            ("Single cycle", NERNST_SLOPE, BLUE),
            ("100 cycles (CCD)", CCD_SLOPE, RED),
        ],
        None,
    )?;

    root.present().map_err(plot_err)?;
    log::info!("rendered Nernst comparison chart to {}", path.display());
    Ok(())
}
