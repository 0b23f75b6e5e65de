//! The Pt100 mask layer stack.
//!
//! Layer ids double as GDS layer numbers (datatype 0 throughout), so the
//! generated files open with the expected numbering in any layout viewer.

use ptlith_core::layer::{FillPattern, Layer, LayerId, LayerStack};

/// Platinum metallization (meander, routing, pads).
pub const METAL: LayerId = 1;
/// Dicing frame.
pub const DICE: LayerId = 10;
/// Alignment marks.
pub const ALIGN: LayerId = 20;
/// Wafer outline.
pub const OUTLINE: LayerId = 90;
/// Wafer-level annotations.
pub const WAFER_TEXT: LayerId = 91;
/// Die text labels.
pub const LABEL: LayerId = 100;

/// The full Pt100 RTD mask stack.
pub fn pt100_stack() -> LayerStack {
    let mut stack = LayerStack::new();
    stack.add_layer(
        Layer::new(METAL, "metal", METAL as u16, 0)
            .with_color(214, 174, 74)
            .with_description("Pt metallization"),
    );
    stack.add_layer(
        Layer::new(DICE, "dice", DICE as u16, 0)
            .with_color(180, 60, 60)
            .with_pattern(FillPattern::Outline)
            .with_description("dicing frame"),
    );
    stack.add_layer(
        Layer::new(ALIGN, "align", ALIGN as u16, 0)
            .with_color(70, 110, 190)
            .with_description("alignment marks"),
    );
    stack.add_layer(
        Layer::new(OUTLINE, "outline", OUTLINE as u16, 0)
            .with_color(90, 90, 90)
            .with_pattern(FillPattern::Outline)
            .with_description("wafer outline"),
    );
    stack.add_layer(
        Layer::new(WAFER_TEXT, "wafer_text", WAFER_TEXT as u16, 0)
            .with_color(40, 40, 40)
            .with_description("wafer annotations"),
    );
    stack.add_layer(
        Layer::new(LABEL, "label", LABEL as u16, 0)
            .with_color(40, 40, 40)
            .with_description("die labels"),
    );
    stack
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_layers() {
        let stack = pt100_stack();
        assert_eq!(stack.layer_count(), 6);
        assert_eq!(stack.get_layer(METAL).unwrap().name, "metal");
        assert_eq!(stack.get_layer_by_gds(100, 0).unwrap().id, LABEL);
    }
}
