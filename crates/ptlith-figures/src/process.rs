//! MOSCAP fabrication cross-sections, one figure per process step.
//!
//! The wafer is drawn as a stack of proportionally scaled slabs (substrate,
//! oxides, polysilicon, backside metallization) with centered captions.
//! Dimensions are schematic, not to scale; the real thicknesses appear in
//! the slab captions.

use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::{plot_err, FigureError};

/// Which layers are present at a given process step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepFlags {
    pub oxide: bool,
    pub poly: bool,
    pub patterned: bool,
    pub poly_doped: bool,
    pub top_pad: bool,
    pub locos: bool,
    pub back_oxide: bool,
    pub back_ti: bool,
    pub back_al: bool,
    pub annealed: bool,
}

/// One step of the process flow.
#[derive(Debug, Clone)]
pub struct ProcessStep {
    pub id: &'static str,
    pub caption: &'static str,
    pub flags: StepFlags,
}

/// The MOSCAP process flow, front-end to backside contact.
pub fn moscap_steps() -> Vec<ProcessStep> {
    let base = StepFlags::default();
    let gated = StepFlags {
        oxide: true,
        poly: true,
        patterned: true,
        poly_doped: true,
        top_pad: true,
        ..base
    };
    vec![
        ProcessStep {
            id: "0.1",
            caption: "LOCOS isolation (optional)",
            flags: StepFlags { locos: true, ..base },
        },
        ProcessStep {
            id: "1.1",
            caption: "Pre-oxidation clean (HF-last)",
            flags: base,
        },
        ProcessStep {
            id: "2.1",
            caption: "Gate oxide growth",
            flags: StepFlags { oxide: true, ..base },
        },
        ProcessStep {
            id: "3.1",
            caption: "Poly-Si deposition (blanket)",
            flags: StepFlags { oxide: true, poly: true, ..base },
        },
        ProcessStep {
            id: "3.2",
            caption: "Poly doping + anneal",
            flags: StepFlags { oxide: true, poly: true, poly_doped: true, ..base },
        },
        ProcessStep {
            id: "4.1",
            caption: "Gate patterning",
            flags: StepFlags { top_pad: false, ..gated },
        },
        ProcessStep {
            id: "5.0",
            caption: "Backside oxide strip",
            flags: StepFlags { back_oxide: true, ..gated },
        },
        ProcessStep {
            id: "5.1",
            caption: "Backside Ti deposition",
            flags: StepFlags { back_ti: true, ..gated },
        },
        ProcessStep {
            id: "5.2",
            caption: "Backside Al deposition",
            flags: StepFlags { back_ti: true, back_al: true, ..gated },
        },
        ProcessStep {
            id: "5.3",
            caption: "Contact anneal",
            flags: StepFlags { back_ti: true, back_al: true, annealed: true, ..gated },
        },
    ]
}

const WAFER_W: f64 = 8.0;
const SUBSTRATE: RGBColor = RGBColor(255, 204, 153);
const OXIDE: RGBColor = RGBColor(204, 204, 255);
const POLY: RGBColor = RGBColor(153, 153, 153);
const POLY_DOPED: RGBColor = RGBColor(119, 119, 119);
const PAD: RGBColor = RGBColor(204, 204, 204);
const BACK_OXIDE: RGBColor = RGBColor(230, 230, 255);
const BACK_TI: RGBColor = RGBColor(153, 153, 204);

struct Slab {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    color: RGBColor,
    label: Option<(String, RGBColor)>,
    hatched: bool,
}

impl Slab {
    fn new(x: f64, y: f64, w: f64, h: f64, color: RGBColor) -> Self {
        Self { x, y, w, h, color, label: None, hatched: false }
    }

    fn labeled(mut self, text: &str) -> Self {
        self.label = Some((text.to_string(), BLACK));
        self
    }

    fn labeled_light(mut self, text: &str) -> Self {
        self.label = Some((text.to_string(), WHITE));
        self
    }
}

/// Slab stack plus free annotations and the vertical extent of the figure.
fn step_layout(flags: &StepFlags) -> (Vec<Slab>, Vec<(String, f64, f64)>, f64, f64) {
    let h_sub = 1.0;
    let h_ox = if flags.oxide { 0.2 } else { 0.1 };
    let h_poly = if flags.poly { 0.4 } else { 0.15 };
    let h_pad = if flags.top_pad { 0.15 } else { 0.0 };

    let mut slabs = Vec::new();
    let mut notes = Vec::new();

    slabs.push(
        Slab::new(0.0, 0.0, WAFER_W, h_sub, SUBSTRATE).labeled("p-type Si substrate"),
    );

    if flags.locos {
        let (lw, lh) = (1.0, 0.4);
        slabs.push(Slab::new(0.0, h_sub, lw, lh, OXIDE));
        slabs.push(Slab::new(WAFER_W - lw, h_sub, lw, lh, OXIDE));
        notes.push(("LOCOS field oxide".to_string(), WAFER_W / 2.0, h_sub + lh / 2.0));
    }

    if flags.oxide {
        slabs.push(
            Slab::new(0.0, h_sub, WAFER_W, h_ox, OXIDE).labeled("Gate oxide (35 nm SiO2)"),
        );
    }

    let y_poly = h_sub + h_ox;
    if flags.poly {
        let color = if flags.poly_doped { POLY_DOPED } else { POLY };
        if flags.patterned {
            let gate_w = 4.0;
            let gate_x = (WAFER_W - gate_w) / 2.0;
            let text = if flags.poly_doped { "n+ polysilicon gate" } else { "Polysilicon gate" };
            slabs.push(Slab::new(gate_x, y_poly, gate_w, h_poly, color).labeled_light(text));
            if flags.top_pad {
                let pad_w = gate_w + 1.0;
                let pad_x = (WAFER_W - pad_w) / 2.0;
                slabs.push(
                    Slab::new(pad_x, y_poly + h_poly, pad_w, h_pad, PAD)
                        .labeled("Top metal pad"),
                );
            }
        } else {
            let text = if flags.poly_doped {
                "n+ polysilicon (blanket)"
            } else {
                "Polysilicon (blanket)"
            };
            slabs.push(Slab::new(0.0, y_poly, WAFER_W, h_poly, color).labeled_light(text));
        }
    }

    // Backside stack grows downward from y = 0.
    let mut y_back = 0.0;
    if flags.back_oxide {
        slabs.push(
            Slab::new(0.0, y_back, WAFER_W, 0.10, BACK_OXIDE).labeled("Backside oxide (thin)"),
        );
    }
    if flags.back_ti {
        slabs.push(
            Slab::new(0.0, y_back, WAFER_W, 0.10, BACK_TI).labeled("Backside Ti (100 nm)"),
        );
        y_back -= 0.15;
    }
    if flags.back_al {
        let mut slab = Slab::new(0.0, y_back, WAFER_W, 0.15, PAD);
        if flags.annealed {
            slab = slab.labeled("Backside Al (400 nm, annealed)");
            slab.hatched = true;
            notes.push(("Alloyed contact formed".to_string(), WAFER_W / 2.0, y_back - 0.15));
        } else {
            slab = slab.labeled("Backside Al (400 nm)");
        }
        slabs.push(slab);
    }

    let top_y = h_sub + h_ox + h_poly + h_pad;
    (slabs, notes, -0.5, top_y + 0.5)
}

fn draw_step<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    step: &ProcessStep,
) -> Result<(), FigureError> {
    root.fill(&WHITE).map_err(plot_err)?;

    let (slabs, notes, y_min, y_max) = step_layout(&step.flags);

    let mut chart = ChartBuilder::on(root)
        .caption(
            format!("{} - {}", step.id, step.caption),
            ("sans-serif", 30),
        )
        .margin(15)
        .build_cartesian_2d(-0.5..WAFER_W + 0.5, y_min..y_max)
        .map_err(plot_err)?;

    chart
        .draw_series(slabs.iter().map(|s| {
            Rectangle::new([(s.x, s.y), (s.x + s.w, s.y + s.h)], s.color.filled())
        }))
        .map_err(plot_err)?;
    chart
        .draw_series(
            slabs
                .iter()
                .map(|s| Rectangle::new([(s.x, s.y), (s.x + s.w, s.y + s.h)], BLACK)),
        )
        .map_err(plot_err)?;

    // 45-degree hatching over annealed metallization.
    let mut hatch = Vec::new();
    for s in slabs.iter().filter(|s| s.hatched) {
        let pitch = 0.25;
        let mut x0 = s.x;
        while x0 + s.h <= s.x + s.w {
            hatch.push(PathElement::new(
                vec![(x0, s.y), (x0 + s.h, s.y + s.h)],
                BLACK,
            ));
            x0 += pitch;
        }
    }
    chart.draw_series(hatch).map_err(plot_err)?;

    let centered = Pos::new(HPos::Center, VPos::Center);
    chart
        .draw_series(slabs.iter().filter_map(|s| {
            let (text, color) = s.label.as_ref()?;
            Some(Text::new(
                text.clone(),
                (s.x + s.w / 2.0, s.y + s.h / 2.0),
                ("sans-serif", 20).into_font().color(color).pos(centered),
            ))
        }))
        .map_err(plot_err)?;
    chart
        .draw_series(notes.iter().map(|(text, x, y)| {
            Text::new(
                text.clone(),
                (*x, *y),
                ("sans-serif", 18).into_font().color(&BLACK).pos(centered),
            )
        }))
        .map_err(plot_err)?;

    Ok(())
}

/// Render every MOSCAP step as PNG and SVG under
/// `<out_dir>/process_steps/moscap/`, returning the written paths.
pub fn render_moscap_steps(out_dir: &Path) -> Result<Vec<PathBuf>, FigureError> {
    let dir = out_dir.join("process_steps").join("moscap");
    std::fs::create_dir_all(&dir)?;

    let mut written = Vec::new();
    for step in moscap_steps() {
        let stem = format!("moscap_step_{}", step.id.replace('.', "-"));

        let png = dir.join(format!("{stem}.png"));
        {
            let root = BitMapBackend::new(&png, (1600, 800)).into_drawing_area();
            draw_step(&root, &step)?;
            root.present().map_err(plot_err)?;
        }
        written.push(png);

        let svg = dir.join(format!("{stem}.svg"));
        {
            let root = SVGBackend::new(&svg, (1600, 800)).into_drawing_area();
            draw_step(&root, &step)?;
            root.present().map_err(plot_err)?;
        }
        written.push(svg);
    }

    log::info!("rendered {} process-step figures into {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_sequence() {
        let steps = moscap_steps();
        assert_eq!(steps.len(), 10);
        assert_eq!(steps[0].id, "0.1");
        assert_eq!(steps[9].id, "5.3");
        assert!(steps[9].flags.annealed && steps[9].flags.back_al);
        // Gate patterning shows the gate but not yet the pad.
        let patterning = steps.iter().find(|s| s.id == "4.1").unwrap();
        assert!(patterning.flags.patterned && !patterning.flags.top_pad);
    }

    #[test]
    fn test_layer_thickness_scaling() {
        // The oxide slab grows when present; the figure extent follows.
        let bare = step_layout(&StepFlags::default());
        let oxidized = step_layout(&StepFlags { oxide: true, ..Default::default() });
        assert!(oxidized.3 > bare.3);
        // Substrate slab is always first.
        assert_eq!(bare.0[0].h, 1.0);
    }

    #[test]
    fn test_backside_stack_extends_downward() {
        let flags = StepFlags {
            oxide: true,
            poly: true,
            patterned: true,
            poly_doped: true,
            top_pad: true,
            back_ti: true,
            back_al: true,
            annealed: true,
            ..Default::default()
        };
        let (slabs, notes, y_min, _) = step_layout(&flags);
        let al = slabs.iter().find(|s| s.hatched).unwrap();
        assert!(al.y < 0.0);
        assert!(y_min < al.y);
        assert!(notes.iter().any(|(t, _, _)| t.contains("Alloyed")));
    }
}
