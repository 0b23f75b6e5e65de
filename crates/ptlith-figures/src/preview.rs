//! Bitmap previews of generated layouts.
//!
//! Draws a cell's geometry (plus one level of instanced subcells) into a
//! PNG using the database's layer colors and visibility flags. Meant for
//! quick visual inspection, not for mask review.

use std::path::Path as FsPath;

use plotters::element::{PathElement, Polygon as PolyElement, Rectangle as RectElement, Text as TextElement};
use plotters::prelude::{BitMapBackend, Color, IntoDrawingArea, IntoFont, RGBColor, WHITE};
use plotters::style::text_anchor::{HPos, Pos, VPos};

use ptlith_core::cell::Cell;
use ptlith_core::database::LayoutDatabase;
use ptlith_core::geometry::GeomPrimitive;
use ptlith_core::layer::LayerStack;

use crate::frame::FigureFrame;
use crate::{plot_err, FigureError};

const FALLBACK: RGBColor = RGBColor(128, 128, 128);

fn layer_color(stack: &LayerStack, layer_id: u32) -> RGBColor {
    stack
        .get_layer(layer_id)
        .map(|l| RGBColor(l.color.r, l.color.g, l.color.b))
        .unwrap_or(FALLBACK)
}

fn layer_visible(stack: &LayerStack, layer_id: u32) -> bool {
    stack.get_layer(layer_id).map_or(true, |l| l.visible)
}

/// Flatten the cell and one level of its instances into world-space
/// geometry.
fn flatten(db: &LayoutDatabase, cell: &Cell) -> Vec<GeomPrimitive> {
    let mut out = cell.geometries.clone();
    for inst in &cell.instances {
        let sub = match db.get_cell(&inst.cell_id) {
            Some(c) => c,
            None => {
                log::warn!("preview: unresolved instance of '{}'", inst.cell_name);
                continue;
            }
        };
        for geom in &sub.geometries {
            let mut g = geom.clone();
            g.transform(&inst.transform);
            out.push(g);
        }
    }
    out
}

/// Render `cell_name` (or the top cell) of `db` into a PNG at `path`.
pub fn render_preview(
    db: &LayoutDatabase,
    cell_name: Option<&str>,
    path: &FsPath,
    width: u32,
    height: u32,
) -> Result<(), FigureError> {
    let cell = match cell_name {
        Some(name) => db
            .find_cell_by_name(name)
            .ok_or_else(|| FigureError::Layout(format!("no cell named '{name}'")))?,
        None => db
            .top_cell()
            .ok_or_else(|| FigureError::Layout("database has no top cell".to_string()))?,
    };

    let geoms = flatten(db, cell);
    let world = geoms
        .iter()
        .filter_map(GeomPrimitive::bbox)
        .reduce(|a, b| a.union(&b))
        .ok_or_else(|| FigureError::Layout(format!("cell '{}' is empty", cell.name)))?;
    let frame = FigureFrame::fit(&world, width, height, 20.0);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    for geom in &geoms {
        if !layer_visible(&db.layer_stack, geom.layer_id()) {
            continue;
        }
        let color = layer_color(&db.layer_stack, geom.layer_id());
        draw_geom(&root, &frame, geom, color)?;
    }

    root.present().map_err(plot_err)?;
    log::info!("rendered preview of '{}' to {}", cell.name, path.display());
    Ok(())
}

fn draw_geom<DB: plotters::prelude::DrawingBackend>(
    root: &plotters::prelude::DrawingArea<DB, plotters::coord::Shift>,
    frame: &FigureFrame,
    geom: &GeomPrimitive,
    color: RGBColor,
) -> Result<(), FigureError> {
    match geom {
        GeomPrimitive::Rect(r) => {
            let corners = [frame.to_pixel(&r.lower_left), frame.to_pixel(&r.upper_right)];
            root.draw(&RectElement::new(corners, color.mix(0.7).filled()))
                .map_err(plot_err)?;
            root.draw(&RectElement::new(corners, color.stroke_width(1)))
                .map_err(plot_err)?;
        }
        GeomPrimitive::Polygon(p) => {
            let pts: Vec<(i32, i32)> = p.vertices.iter().map(|v| frame.to_pixel(v)).collect();
            root.draw(&PolyElement::new(pts.clone(), color.mix(0.35).filled()))
                .map_err(plot_err)?;
            let mut outline = pts;
            if let Some(first) = outline.first().copied() {
                outline.push(first);
            }
            root.draw(&PathElement::new(outline, color.stroke_width(1)))
                .map_err(plot_err)?;
        }
        GeomPrimitive::Path(p) => {
            let pts: Vec<(i32, i32)> = p.points.iter().map(|v| frame.to_pixel(v)).collect();
            let stroke = frame.to_pixel_len(p.width);
            root.draw(&PathElement::new(pts, color.mix(0.9).stroke_width(stroke)))
                .map_err(plot_err)?;
        }
        GeomPrimitive::Text(t) => {
            let size = (t.size * frame.scale()).clamp(8.0, 64.0) as u32;
            let style = ("sans-serif", size)
                .into_font()
                .color(&color)
                .pos(Pos::new(HPos::Center, VPos::Center));
            root.draw(&TextElement::new(
                t.string.clone(),
                frame.to_pixel(&t.origin),
                style,
            ))
            .map_err(plot_err)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptlith_core::cell::{CellInstance, Transform};
    use ptlith_core::geometry::Rect;

    #[test]
    fn test_flatten_applies_instance_offsets() {
        let mut db = LayoutDatabase::new("t");
        let mut sub = Cell::new("sub");
        sub.add_geometry(GeomPrimitive::Rect(Rect::new(1, 0.0, 0.0, 10.0, 10.0)));
        let sub_id = db.add_cell(sub);

        let mut top = Cell::new("top");
        top.add_instance(CellInstance::new(sub_id, "sub", Transform::translate(100.0, 50.0)));
        let top_id = db.add_cell(top);

        let flat = flatten(&db, db.get_cell(&top_id).unwrap());
        assert_eq!(flat.len(), 1);
        let bb = flat[0].bbox().unwrap();
        assert_eq!((bb.min.x, bb.min.y), (100.0, 50.0));
        assert_eq!((bb.max.x, bb.max.y), (110.0, 60.0));
    }

    #[test]
    fn test_unknown_cell_is_an_error() {
        let db = LayoutDatabase::new("t");
        let err = render_preview(&db, Some("missing"), FsPath::new("/tmp/x.png"), 64, 64)
            .unwrap_err();
        assert!(matches!(err, FigureError::Layout(_)));
    }
}
