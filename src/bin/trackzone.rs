use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use trackzone::{
    logging::{self, LogFormat},
    report::detection_rows,
    Config, CrossingEngine, Detection, ObjectKind, ReportAssembler,
};

#[derive(Parser)]
#[command(
    name = "trackzone",
    about = "Count tracked objects crossing lines and entering areas",
    version
)]
struct Args {
    /// Path to the region configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Tracked detections CSV (track_id, frame_index, confidence, xmin, ymin, xmax, ymax)
    #[arg(short, long)]
    detections: PathBuf,

    /// Write one row per event to this CSV file
    #[arg(short, long)]
    events: Option<PathBuf>,

    /// Write the aggregate report as JSON
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Override the frame rate from the config file
    #[arg(long)]
    fps: Option<f64>,

    /// Override the object kind used in summaries
    #[arg(long, value_enum)]
    object_kind: Option<ObjectKind>,

    /// Feed detections in frame order instead of file order
    #[arg(long)]
    sort_by_frame: bool,

    /// Log format (defaults to LOG_FORMAT or compact)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

struct ProcessingState {
    engine: CrossingEngine,
    assembler: ReportAssembler,
    processed: usize,
    rejected: usize,
}

impl ProcessingState {
    fn process_detection(&mut self, det: &Detection) {
        match self.engine.process(det) {
            Ok(events) => {
                self.processed += 1;
                self.assembler.record(events);
            }
            // already logged by the engine
            Err(_) => self.rejected += 1,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log_format.unwrap_or_else(LogFormat::from_env))?;

    let mut config = Config::from_file(&args.config)?;
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if let Some(kind) = args.object_kind {
        config.object_kind = kind;
    }
    info!(
        config = %args.config.display(),
        regions = config.regions.len(),
        fps = config.fps,
        "configuration loaded"
    );

    let engine = config.build_engine().context("failed to build crossing engine")?;

    let mut state = ProcessingState {
        engine,
        assembler: ReportAssembler::new(config.object_kind),
        processed: 0,
        rejected: 0,
    };

    let file = File::open(&args.detections)
        .with_context(|| format!("failed to open {}", args.detections.display()))?;
    let mut detections = Vec::new();
    for (row, record) in detection_rows(BufReader::new(file)) {
        match record {
            Ok(det) => detections.push(det),
            Err(err) => {
                warn!(row, error = %format!("{:#}", err), "skipping malformed detection row");
                state.rejected += 1;
            }
        }
    }
    if args.sort_by_frame {
        // stable, so per-track order within a frame is kept
        detections.sort_by_key(|d| d.frame_index);
    }
    info!(count = detections.len(), "detections loaded");

    for det in &detections {
        state.process_detection(det);
    }
    if state.rejected > 0 {
        warn!(rejected = state.rejected, "some detections were skipped");
    }
    info!(processed = state.processed, "processing completed");

    if let Some(path) = &args.events {
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        state.assembler.write_events_csv(BufWriter::new(file))?;
        info!(path = %path.display(), "events written");
    }

    let counts = state.engine.counts();
    let report = state.assembler.finish(state.engine.regions(), &counts);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for line in report.summary_lines() {
        writeln!(out, "{}", line)?;
    }

    Ok(())
}
