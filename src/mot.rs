//! MOTChallenge-style text files.
//!
//! Detection rows are `frame, id, x, y, w, h, confidence, x3d, y3d, z3d`
//! followed by the appearance feature. Result rows are
//! `frame, id, x, y, w, h, 1, -1, -1, -1`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array1;

use crate::deep_sort::deep_sort::TrackOutput;
use crate::sort::detection::Detection;

const FEATURE_OFFSET: usize = 10;

/// Detections grouped by frame number.
pub type FrameDetections = BTreeMap<u32, Vec<Detection>>;

pub fn parse_detections(text: &str) -> Result<FrameDetections> {
    let mut frames = FrameDetections::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() <= FEATURE_OFFSET {
            bail!(
                "line {}: expected at least {} columns, found {}",
                lineno + 1,
                FEATURE_OFFSET + 1,
                fields.len()
            );
        }

        let values = fields
            .iter()
            .map(|f| f.parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .with_context(|| format!("line {}: malformed number", lineno + 1))?;

        if values[0] < 0.0 || values[0].fract() != 0.0 {
            bail!("line {}: invalid frame number {}", lineno + 1, values[0]);
        }
        let frame = values[0] as u32;
        let tlwh = [values[2], values[3], values[4], values[5]];
        let feature: Array1<f32> = values[FEATURE_OFFSET..].iter().map(|&v| v as f32).collect();

        let bucket = frames.entry(frame).or_default();
        match Detection::new(tlwh, values[6], feature) {
            Ok(detection) => bucket.push(detection),
            Err(e) => log::warn!("line {}: skipping detection: {}", lineno + 1, e),
        }
    }
    Ok(frames)
}

pub fn read_detections(path: &Path) -> Result<FrameDetections> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read detections {}", path.display()))?;
    parse_detections(&text).with_context(|| format!("in {}", path.display()))
}

/// Append the result rows of one frame to `out`.
pub fn format_results(out: &mut String, frame: u32, outputs: &[TrackOutput]) {
    for output in outputs {
        let [x, y, w, h] = output.tlwh;
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "{},{},{:.2},{:.2},{:.2},{:.2},1,-1,-1,-1",
            frame, output.track_id, x, y, w, h
        );
    }
}

pub fn write_results(path: &Path, results: &str) -> Result<()> {
    fs::write(path, results).with_context(|| format!("failed to write results {}", path.display()))
}
