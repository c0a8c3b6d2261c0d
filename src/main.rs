use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use deepsort::deep_sort::deep_sort::DeepSort;
use deepsort::mot;
use deepsort::{DeepSortConfig, Detection};

/// Multi-object tracking over per-frame detections.
#[derive(Parser)]
#[command(name = "deepsort")]
struct Cli {
    /// JSON file with tracker settings; missing fields use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Track a MOTChallenge detection file with appended features.
    Run {
        /// Detection file: frame,id,x,y,w,h,conf,x,y,z,feature...
        #[arg(long)]
        detections: PathBuf,

        /// Where to write frame,id,x,y,w,h,1,-1,-1,-1 rows.
        #[arg(long)]
        output: PathBuf,
    },
    /// Track synthetic objects moving on a random walk.
    Simulate {
        #[arg(long, default_value = "200")]
        frames: u32,

        #[arg(long, default_value = "5")]
        objects: usize,

        /// Probability that an object is not detected in a frame.
        #[arg(long, default_value = "0.1", value_parser = parse_probability)]
        miss_rate: f64,

        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

fn parse_probability(s: &str) -> std::result::Result<f64, String> {
    let p: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(format!("{} is not a probability in [0, 1]", s))
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DeepSortConfig::from_json_file(path)?,
        None => DeepSortConfig::default(),
    };

    match cli.command {
        Command::Run { detections, output } => run(&config, detections, output),
        Command::Simulate {
            frames,
            objects,
            miss_rate,
            seed,
        } => simulate(&config, frames, objects, miss_rate, seed),
    }
}

fn run(config: &DeepSortConfig, detections: PathBuf, output: PathBuf) -> Result<()> {
    let mut frames = mot::read_detections(&detections)?;
    let (Some(&first), Some(&last)) = (frames.keys().next(), frames.keys().next_back()) else {
        log::warn!("{} holds no detections", detections.display());
        return mot::write_results(&output, "");
    };

    let mut deep_sort = DeepSort::new(config)?;
    let mut results = String::new();
    let mut sum = 0;

    // Frames without a row still advance the tracks.
    for frame in first..=last {
        let frame_detections = frames.remove(&frame).unwrap_or_default();
        let start = Local::now();
        let outputs = deep_sort
            .update(frame_detections)
            .with_context(|| format!("frame {}", frame))?;
        sum += (Local::now() - start).num_milliseconds();
        mot::format_results(&mut results, frame, &outputs);
    }

    mot::write_results(&output, &results)?;
    log::info!(
        "tracked frames {}..={} in {} ms, output written to {}",
        first,
        last,
        sum,
        output.display()
    );
    Ok(())
}

struct Walker {
    tlwh: [f64; 4],
    velocity: [f64; 2],
    feature: Vec<f32>,
}

fn simulate(config: &DeepSortConfig, frames: u32, objects: usize, miss_rate: f64, seed: u64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let feature_len = 32;

    let mut walkers: Vec<Walker> = (0..objects)
        .map(|_| Walker {
            tlwh: [
                rng.gen_range(0.0..1500.0),
                rng.gen_range(0.0..800.0),
                rng.gen_range(30.0..80.0),
                rng.gen_range(80.0..200.0),
            ],
            velocity: [rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0)],
            feature: (0..feature_len).map(|_| rng.gen_range(-1.0f32..1.0)).collect(),
        })
        .collect();

    let mut deep_sort = DeepSort::new(config)?;
    let mut reported = HashSet::new();
    let mut sum = 0;

    for frame in 1..=frames {
        let mut detections = vec![];
        for walker in &mut walkers {
            walker.tlwh[0] += walker.velocity[0] + rng.gen_range(-0.5..0.5);
            walker.tlwh[1] += walker.velocity[1] + rng.gen_range(-0.5..0.5);
            if rng.gen_bool(miss_rate) {
                continue;
            }
            let feature: Array1<f32> = walker
                .feature
                .iter()
                .map(|&v| v + rng.gen_range(-0.05f32..0.05))
                .collect();
            detections.push(Detection::new(walker.tlwh, rng.gen_range(0.5..1.0), feature)?);
        }

        let start = Local::now();
        let outputs = deep_sort.update(detections)?;
        sum += (Local::now() - start).num_milliseconds();
        reported.extend(outputs.iter().map(|o| o.track_id));
        log::debug!("frame {}: {} tracks reported", frame, outputs.len());
    }

    println!(
        "{} frames, {} objects, {} identities reported, {} active tracks, {} ms",
        frames,
        objects,
        reported.len(),
        deep_sort.tracker().tracks().len(),
        sum
    );
    Ok(())
}
