//! Symbolic sensor signal-chain diagram: sensor, buffer, amplifier, output.

use std::path::Path;

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::{plot_err, FigureError};

type Chart<'a, 'b> = ChartContext<
    'a,
    BitMapBackend<'b>,
    Cartesian2d<plotters::coord::types::RangedCoordf64, plotters::coord::types::RangedCoordf64>,
>;

const LIGHT_BLUE: RGBColor = RGBColor(173, 216, 230);
const LAVENDER: RGBColor = RGBColor(230, 230, 250);
const LIGHT_YELLOW: RGBColor = RGBColor(255, 255, 224);
const PURPLE: RGBColor = RGBColor(128, 0, 128);

fn glyph_text(chart: &mut Chart, text: &str, x: f64, y: f64, size: u32) -> Result<(), FigureError> {
    let style = ("sans-serif", size)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));
    chart
        .draw_series(std::iter::once(Text::new(text.to_string(), (x, y), style)))
        .map_err(plot_err)?;
    Ok(())
}

/// Straight arrow from `(x0, y)` to `(x1, y)`: a shaft plus a triangular
/// head in data coordinates.
fn arrow(chart: &mut Chart, x0: f64, x1: f64, y: f64, color: RGBColor, head: f64) -> Result<(), FigureError> {
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(x0, y), (x1 - head, y)],
            color.stroke_width(3),
        )))
        .map_err(plot_err)?;
    chart
        .draw_series(std::iter::once(Polygon::new(
            vec![(x1 - head, y - head / 2.0), (x1 - head, y + head / 2.0), (x1, y)],
            color.filled(),
        )))
        .map_err(plot_err)?;
    Ok(())
}

/// Render the sensor -> buffer -> amplifier -> output diagram.
pub fn render_signal_chain(path: &Path) -> Result<(), FigureError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 120 px per data unit on both axes keeps the glyphs undistorted.
    let root = BitMapBackend::new(path, (1200, 720)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .build_cartesian_2d(0.0..10.0, 0.0..6.0)
        .map_err(plot_err)?;

    let y = 4.0;

    // Sensor: circle with an "S".
    chart
        .draw_series(std::iter::once(Circle::new((2.0, y), 60, LIGHT_BLUE.filled())))
        .map_err(plot_err)?;
    chart
        .draw_series(std::iter::once(Circle::new((2.0, y), 60, BLUE.stroke_width(2))))
        .map_err(plot_err)?;
    glyph_text(&mut chart, "S", 2.0, y, 28)?;

    // Buffer: square with a "B".
    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(3.5, y - 0.5), (4.5, y + 0.5)],
            LAVENDER.filled(),
        )))
        .map_err(plot_err)?;
    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(3.5, y - 0.5), (4.5, y + 0.5)],
            PURPLE.stroke_width(2),
        )))
        .map_err(plot_err)?;
    glyph_text(&mut chart, "B", 4.0, y, 24)?;

    // Amplifier: right-pointing triangle with a "+".
    let tri = vec![(5.5, y - 0.5), (6.5, y), (5.5, y + 0.5)];
    chart
        .draw_series(std::iter::once(Polygon::new(tri.clone(), LIGHT_YELLOW.filled())))
        .map_err(plot_err)?;
    let mut outline = tri;
    outline.push((5.5, y - 0.5));
    chart
        .draw_series(std::iter::once(PathElement::new(outline, BLACK.stroke_width(2))))
        .map_err(plot_err)?;
    glyph_text(&mut chart, "+", 5.85, y, 30)?;

    // Output: green arrow with an "Out" tag.
    arrow(&mut chart, 7.5, 8.5, y, GREEN, 0.33)?;
    chart
        .draw_series(std::iter::once(Text::new(
            "Out".to_string(),
            (8.55, y),
            ("sans-serif", 22)
                .into_font()
                .color(&GREEN)
                .pos(Pos::new(HPos::Left, VPos::Center)),
        )))
        .map_err(plot_err)?;

    // Connectors.
    arrow(&mut chart, 2.5, 3.5, y, BLACK, 0.2)?;
    arrow(&mut chart, 4.5, 5.5, y, BLACK, 0.2)?;
    arrow(&mut chart, 6.5, 7.5, y, BLACK, 0.2)?;

    // Stage names above the glyphs.
    for (text, x) in [("Sensor", 2.0), ("Buffer", 4.0), ("Amplifier", 6.0), ("Output", 8.0)] {
        glyph_text(&mut chart, text, x, y + 0.7, 24)?;
    }

    root.present().map_err(plot_err)?;
    log::info!("rendered signal-chain diagram to {}", path.display());
    Ok(())
}
