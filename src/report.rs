//! Tabular and JSON outputs of batch evaluation
//!
//! Writes `batch_results.csv`, `batch_curve_long.csv` and
//! `batch_summary.json`, and turns the long-form curve table back into
//! per-tolerance statistics (mean F1 with a ±1 SD band).

use crate::{
    batch::{BatchReport, BatchSummary, CurveRow, SampleResult},
    error::{BoundaryError, Result},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

pub const RESULTS_CSV: &str = "batch_results.csv";
pub const CURVE_CSV: &str = "batch_curve_long.csv";
pub const SUMMARY_JSON: &str = "batch_summary.json";

const CURVE_HEADER: [&str; 4] = ["filename", "site_id", "tolerance_px", "boundary_f1"];

/// Arithmetic mean, 0 for an empty slice
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator), 0 for fewer than two values
#[must_use]
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Split one CSV record, honoring double-quoted fields
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            },
            ('"', _) => quoted = !quoted,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| BoundaryError::file_io_error("create output file", path, &e))
}

/// Headline table, one row per evaluated pair
pub fn write_results_csv(
    path: &Path,
    results: &[SampleResult],
    sanity_tolerance: u32,
) -> Result<()> {
    let mut out = create(path)?;
    writeln!(
        out,
        "filename,site_id,mask_source,auc_bas,f1_at_t{}",
        sanity_tolerance
    )?;
    for r in results {
        writeln!(
            out,
            "{},{},{},{:?},{:?}",
            csv_field(&r.filename),
            csv_field(&r.site_id),
            csv_field(&r.mask_source),
            r.auc_bas,
            r.f1_at_sanity
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Long-form curve table, one row per (pair, tolerance)
pub fn write_curve_csv(path: &Path, rows: &[CurveRow]) -> Result<()> {
    let mut out = create(path)?;
    writeln!(out, "{}", CURVE_HEADER.join(","))?;
    for row in rows {
        writeln!(
            out,
            "{},{},{},{:?}",
            csv_field(&row.filename),
            csv_field(&row.site_id),
            row.tolerance_px,
            row.boundary_f1
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &BatchSummary) -> Result<()> {
    let mut out = create(path)?;
    serde_json::to_writer_pretty(&mut out, summary)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Paths of the files written for one batch
#[derive(Debug, Clone)]
pub struct BatchOutputPaths {
    pub results_csv: PathBuf,
    pub curve_csv: PathBuf,
    pub summary_json: PathBuf,
}

/// Write all batch outputs into `output_dir`, creating it if needed
pub fn write_batch_outputs(
    report: &BatchReport,
    output_dir: &Path,
    sanity_tolerance: u32,
) -> Result<BatchOutputPaths> {
    std::fs::create_dir_all(output_dir)
        .map_err(|e| BoundaryError::file_io_error("create output directory", output_dir, &e))?;

    let paths = BatchOutputPaths {
        results_csv: output_dir.join(RESULTS_CSV),
        curve_csv: output_dir.join(CURVE_CSV),
        summary_json: output_dir.join(SUMMARY_JSON),
    };

    write_results_csv(&paths.results_csv, &report.results, sanity_tolerance)?;
    write_curve_csv(&paths.curve_csv, &report.curve_rows)?;
    write_summary_json(&paths.summary_json, &report.summary)?;

    info!(output_dir = %output_dir.display(), "batch outputs written");
    Ok(paths)
}

/// Read `(tolerance_px, boundary_f1)` points from a long-form curve table
///
/// Rows whose tolerance is not an integer or whose F1 is not a finite number
/// are skipped.
///
/// # Errors
/// - `BoundaryError::Io` if the file cannot be read
/// - `BoundaryError::Processing` if a required column is missing
pub fn read_curve_points(path: &Path) -> Result<Vec<(u32, f64)>> {
    let file = File::open(path).map_err(|e| BoundaryError::file_io_error("open curve table", path, &e))?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => split_csv_line(line?.trim_start_matches('\u{feff}').trim_end()),
        None => return Ok(Vec::new()),
    };
    let column = |name: &str| {
        header.iter().position(|h| h == name).ok_or_else(|| {
            BoundaryError::processing_stage_error(
                "curve table parsing",
                &format!("missing column '{}'", name),
                Some(&path.display().to_string()),
            )
        })
    };
    let tol_idx = column("tolerance_px")?;
    let f1_idx = column("boundary_f1")?;

    let mut points = Vec::new();
    let mut rejected = 0usize;
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line.trim_end());
        let tolerance = fields.get(tol_idx).and_then(|v| v.trim().parse::<u32>().ok());
        let f1 = fields
            .get(f1_idx)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite());
        match (tolerance, f1) {
            (Some(t), Some(f)) => points.push((t, f)),
            _ => rejected += 1,
        }
    }

    if rejected > 0 {
        debug!(rejected, path = %path.display(), "skipped unparsable curve rows");
    }
    Ok(points)
}

/// Per-tolerance F1 statistics across pairs, tolerances ascending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveStatistics {
    pub tolerances: Vec<u32>,
    pub mean_f1: Vec<f64>,
    /// Sample standard deviation, 0 where only one value exists
    pub sd_f1: Vec<f64>,
    pub n: Vec<usize>,
    /// `mean - sd` clipped to `[0, 1]`
    pub lower: Vec<f64>,
    /// `mean + sd` clipped to `[0, 1]`
    pub upper: Vec<f64>,
}

impl CurveStatistics {
    #[must_use]
    pub fn from_points(points: &[(u32, f64)]) -> Self {
        let mut groups: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for &(tolerance, f1) in points.iter().filter(|(_, f1)| f1.is_finite()) {
            groups.entry(tolerance).or_default().push(f1);
        }

        let mut stats = Self {
            tolerances: Vec::with_capacity(groups.len()),
            mean_f1: Vec::with_capacity(groups.len()),
            sd_f1: Vec::with_capacity(groups.len()),
            n: Vec::with_capacity(groups.len()),
            lower: Vec::with_capacity(groups.len()),
            upper: Vec::with_capacity(groups.len()),
        };
        for (tolerance, scores) in groups {
            let m = mean(&scores);
            let sd = sample_std(&scores);
            stats.tolerances.push(tolerance);
            stats.mean_f1.push(m);
            stats.sd_f1.push(sd);
            stats.n.push(scores.len());
            stats.lower.push((m - sd).clamp(0.0, 1.0));
            stats.upper.push((m + sd).clamp(0.0, 1.0));
        }
        stats
    }

    #[must_use]
    pub fn from_rows(rows: &[CurveRow]) -> Self {
        let points: Vec<(u32, f64)> = rows.iter().map(|r| (r.tolerance_px, r.boundary_f1)).collect();
        Self::from_points(&points)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tolerances.is_empty()
    }

    /// Smallest per-tolerance sample count
    #[must_use]
    pub fn min_n(&self) -> usize {
        self.n.iter().copied().min().unwrap_or(0)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| BoundaryError::file_io_error("create output directory", parent, &e))?;
        }
        let mut out = create(path)?;
        serde_json::to_writer_pretty(&mut out, self)?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }
}
