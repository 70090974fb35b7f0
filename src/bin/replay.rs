//! Replay recorded detections through the deposit tracker.
//!
//! Input is JSON lines, one frame per line:
//!
//! ```text
//! {"timestamp": 0.033, "detections": [{"class": "dog", "bbox": [450, 340, 550, 400], "confidence": 0.92}]}
//! ```
//!
//! Every emitted event is printed as one JSON line on stdout.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use deposit_track_rs::{Detection, DogAssociator, MonitorConfig, ObjectClass, Rect, SharedTracker};
use log::{info, warn};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(about = "Replay a JSON-lines detection log through the deposit tracker")]
struct Args {
    /// Detection log, one JSON frame per line
    #[arg(long)]
    frames: PathBuf,
    /// TOML config; defaults to $DEPOSIT_TRACK_CONFIG or ./deposit-track.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the final status after the last frame
    #[arg(long)]
    status: bool,
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    timestamp: f64,
    #[serde(default)]
    detections: Vec<DetectionRecord>,
}

#[derive(Debug, Deserialize)]
struct DetectionRecord {
    class: ObjectClass,
    /// TLBR
    bbox: [f32; 4],
    confidence: f32,
}

impl From<&DetectionRecord> for Detection {
    fn from(r: &DetectionRecord) -> Self {
        Detection::from_rect(
            r.class,
            Rect::from_tlbr(r.bbox[0], r.bbox[1], r.bbox[2], r.bbox[3]),
            r.confidence,
        )
    }
}

/// Frames accepted and rejected by the tracker during one replay.
#[derive(Debug, Default, PartialEq)]
struct ReplaySummary {
    frames: usize,
    rejected: usize,
}

/// Feed every JSON line of `input` through the tracker, writing each event
/// as one JSON line to `out`. Out-of-order frames are skipped and counted.
fn replay<R: BufRead, W: Write>(
    input: R,
    out: &mut W,
    tracker: &SharedTracker,
    dogs: &mut DogAssociator,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for (lineno, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", lineno + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FrameRecord = serde_json::from_str(&line)
            .with_context(|| format!("parsing frame on line {}", lineno + 1))?;

        let detections: Vec<Detection> = record.detections.iter().map(Detection::from).collect();
        let samples = dogs.associate(&detections);
        match tracker.update(record.timestamp, &detections, &samples) {
            Ok(events) => {
                summary.frames += 1;
                for event in events {
                    writeln!(out, "{}", serde_json::to_string(&event)?)?;
                }
            }
            Err(err) => {
                summary.rejected += 1;
                warn!("skipping line {}: {}", lineno + 1, err);
            }
        }
    }
    Ok(summary)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => MonitorConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MonitorConfig::load(),
    };

    let tracker = SharedTracker::new(config.tracking.clone(), config.feed.capacity)
        .context("creating tracker")?;
    let mut dogs = DogAssociator::new(config.dogs.clone());

    let file = File::open(&args.frames)
        .with_context(|| format!("opening {}", args.frames.display()))?;
    let stdout = std::io::stdout();
    let summary = replay(BufReader::new(file), &mut stdout.lock(), &tracker, &mut dogs)?;

    let status = tracker.status();
    info!(
        "replayed {} frames ({} rejected): {} active, {} pending, {} cleaned, {} total",
        summary.frames,
        summary.rejected,
        status.active.len(),
        status.pending_count,
        status.cleaned_count,
        status.total_deposits
    );
    if args.status {
        println!("{}", serde_json::to_string_pretty(&status)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_frames_are_not_counted_as_replayed() {
        let input = "{\"timestamp\": 0.0}\n\n{\"timestamp\": 1.0}\n{\"timestamp\": 0.5}\n{\"timestamp\": 2.0}\n";
        let tracker = SharedTracker::default();
        let mut dogs = DogAssociator::default();
        let mut out = Vec::new();

        let summary = replay(input.as_bytes(), &mut out, &tracker, &mut dogs).unwrap();
        assert_eq!(
            summary,
            ReplaySummary {
                frames: 3,
                rejected: 1
            }
        );
        assert_eq!(tracker.status().frame_id, 3);
        assert!(out.is_empty());
    }

    #[test]
    fn test_events_are_written_as_json_lines() {
        let dog = r#"{"class": "dog", "bbox": [450, 340, 550, 400], "confidence": 0.95}"#;
        let mut input = String::new();
        for i in 0..31 {
            input.push_str(&format!(
                "{{\"timestamp\": {}, \"detections\": [{}]}}\n",
                i as f64 / 10.0,
                dog
            ));
        }
        input.push_str(
            r#"{"timestamp": 3.1, "detections": [{"class": "deposit_candidate", "bbox": [490, 390, 520, 420], "confidence": 0.9}]}"#,
        );
        input.push('\n');

        let tracker = SharedTracker::default();
        let mut dogs = DogAssociator::default();
        let mut out = Vec::new();
        let summary = replay(input.as_bytes(), &mut out, &tracker, &mut dogs).unwrap();
        assert_eq!(summary.frames, 32);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let event: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(event["type"], "deposit_confirmed");
    }
}
