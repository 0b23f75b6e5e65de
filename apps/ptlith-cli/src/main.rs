//! `ptlith` command-line driver.
//!
//! Generates the Pt100 RTD mask set and the accompanying figures:
//! the sensor die, the electrode-die merge, wafer-level tilings, process
//! cross-sections, sensor charts, and layout previews.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;

use ptlith_core::database::LayoutDatabase;
use ptlith_core::geometry::Point;
use ptlith_drc::{has_errors, run_die_checks};
use ptlith_figures::{
    render_moscap_steps, render_nernst_chart, render_preview, render_signal_chain,
};
use ptlith_io::{read_gds_file, write_gds_file};
use ptlith_layouts::{
    build_rtd_die, merge_rtd_into_electrodes, tile_wafer, MergeParams, RtdParams, TilingReport,
    WaferParams,
};

#[derive(Parser, Debug)]
#[command(name = "ptlith")]
#[command(about = "Pt100 RTD photomask and figure generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the Pt100 RTD sensor die GDS (with design-rule checks)
    Rtd {
        /// Output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
    },
    /// Tile a die GDS across a 100 mm wafer
    Wafer {
        /// Die GDS file; its top cell is tiled
        #[arg(long)]
        die: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
        /// Override the die footprint width in um (default: top cell bbox)
        #[arg(long)]
        die_w: Option<f64>,
        /// Override the die footprint height in um (default: top cell bbox)
        #[arg(long)]
        die_h: Option<f64>,
        /// Write a JSON tiling report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Merge the RTD die into the electrode die
    Merge {
        /// Electrode GDS file (its top cell receives the sensors)
        #[arg(long)]
        electrodes: PathBuf,
        /// RTD die GDS file
        #[arg(long)]
        rtd: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
    },
    /// Render all explanatory figures
    Figures {
        /// Output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
    },
    /// Render a PNG preview of a layout
    Preview {
        /// GDS file to preview
        #[arg(long)]
        gds: PathBuf,
        /// Cell to render (default: top cell)
        #[arg(long)]
        cell: Option<String>,
        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value = "1200")]
        width: u32,
        #[arg(long, default_value = "1200")]
        height: u32,
    },
    /// Generate every artifact: die, merge, wafers, figures
    All {
        /// Output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
        /// Electrode GDS; when given, the merge and its wafer are built too
        #[arg(long)]
        electrodes: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Rtd { out } => {
            cmd_rtd(&out)?;
        }
        Command::Wafer { die, out, die_w, die_h, report } => {
            cmd_wafer(&die, &out, die_w, die_h, None, report.as_deref())?;
        }
        Command::Merge { electrodes, rtd, out } => {
            cmd_merge(&electrodes, &rtd, &out)?;
        }
        Command::Figures { out } => {
            cmd_figures(&out)?;
        }
        Command::Preview { gds, cell, out, width, height } => {
            let db = read_gds_file(&gds)
                .with_context(|| format!("reading {}", gds.display()))?;
            render_preview(&db, cell.as_deref(), &out, width, height)?;
        }
        Command::All { out, electrodes } => {
            let rtd_gds = cmd_rtd(&out)?;
            cmd_wafer(&rtd_gds, &out, None, None, None, None)?;
            if let Some(elec) = electrodes {
                let merged = cmd_merge(&elec, &rtd_gds, &out)?;
                // The electrode die's footprint is anchored on its right
                // edge, y-centered; the bbox of the merged stream does not
                // capture that, so use the known footprint.
                let params = MergeParams::default();
                cmd_wafer(
                    &merged,
                    &out,
                    Some(params.die_w),
                    Some(params.die_h),
                    Some(params.origin_offset()),
                    None,
                )?;
            }
            cmd_figures(&out)?;
        }
    }
    Ok(())
}

/// Build the RTD die, gate it on DRC, and write `pt100_rtd.gds`.
fn cmd_rtd(out: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(out)?;
    let params = RtdParams::default();
    let die = build_rtd_die(&params);

    let cell = die
        .db
        .get_cell(&die.cell)
        .context("generated die cell missing from database")?;
    let violations = run_die_checks(cell, die.meander_index, &die.frame(), params.sense_min_clear);
    if has_errors(&violations) {
        bail!("RTD die failed design-rule checks: {} violation(s)", violations.len());
    }

    let path = out.join("pt100_rtd.gds");
    write_gds_file(&die.db, &path).with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(path)
}

/// Tile the top cell of `die_path` across the wafer, writing
/// `<stem>_wafer.gds` next to the other outputs.
fn cmd_wafer(
    die_path: &Path,
    out: &Path,
    die_w: Option<f64>,
    die_h: Option<f64>,
    origin: Option<Point>,
    report_path: Option<&Path>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(out)?;
    let mut db = read_gds_file(die_path)
        .with_context(|| format!("reading {}", die_path.display()))?;

    let die_cell = db
        .top_cell
        .with_context(|| format!("{} has no top cell to tile", die_path.display()))?;
    let bbox = db
        .top_cell()
        .and_then(|c| c.local_bbox())
        .with_context(|| format!("top cell of {} has no geometry", die_path.display()))?;

    let w = die_w.unwrap_or_else(|| bbox.width());
    let h = die_h.unwrap_or_else(|| bbox.height());
    let origin = origin.unwrap_or(bbox.min);
    let report = tile_wafer(&mut db, die_cell, w, h, origin, &WaferParams::default())?;

    let stem = die_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("die");
    let path = out.join(format!("{stem}_wafer.gds"));
    write_gds_file(&db, &path).with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {} ({} dies placed)", path.display(), report.placed);

    if let Some(report_path) = report_path {
        write_report(&report, report_path)?;
    }
    Ok(path)
}

fn write_report(report: &TilingReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote tiling report to {}", path.display());
    Ok(())
}

/// Merge the RTD die into the electrode die, writing `rtd_sulfilogger.gds`.
fn cmd_merge(electrodes: &Path, rtd: &Path, out: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(out)?;
    let path = out.join("rtd_sulfilogger.gds");
    let report = merge_rtd_into_electrodes(electrodes, rtd, &path, &MergeParams::default())?;
    log::info!(
        "wrote {} ('{}' placed {} times)",
        path.display(),
        report.rtd_cell,
        report.placements
    );
    Ok(path)
}

/// Render process steps, the Nernst comparison chart, the signal-chain
/// diagram, and a preview of the RTD die if it has been generated.
fn cmd_figures(out: &Path) -> Result<()> {
    std::fs::create_dir_all(out)?;
    render_moscap_steps(out)?;
    render_nernst_chart(&out.join("nernst_vs_ccd.png"))?;
    render_signal_chain(&out.join("sensor_signal_chain.png"))?;

    let rtd_gds = out.join("pt100_rtd.gds");
    if rtd_gds.exists() {
        let db = read_gds_file(&rtd_gds)?;
        preview_with_stack(db, &out.join("pt100_rtd_preview.png"))?;
    }
    Ok(())
}

/// GDS files carry no display colors; re-attach the Pt100 stack before
/// rendering so the preview uses the proper layer palette.
fn preview_with_stack(mut db: LayoutDatabase, path: &Path) -> Result<()> {
    db.layer_stack = ptlith_layouts::tech::pt100_stack();
    render_preview(&db, None, path, 1200, 1200)?;
    Ok(())
}
