use std::{
    io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        mpsc::{self, Receiver},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use clap::{Parser, Subcommand, arg};
use log::{info, warn};
use serde::Serialize;

use ecodrive::{
    AppConfig, Coordinate, EcoBand, EcoDriveError, EcoDriveResult, RouteScorer, ScoringModel,
    TelemetryAggregator, TripMonitor, eco_tips,
    routing::OsrmClient,
    scoring::{FeatureScaler, HeuristicBackend, LinearModelBackend},
    telemetry::{
        Clock, ManualClock, RecordedTripProducer, SensorProducer, StreamingTripProducer,
        SystemClock, TripRecord, collect_trip,
    },
    writer,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rank alternative routes between two points by predicted fuel use
    Plan {
        /// Origin as "lat,lng"
        #[arg(short, long, allow_hyphen_values = true)]
        from: Coordinate,

        /// Destination as "lat,lng"
        #[arg(short, long, allow_hyphen_values = true)]
        to: Coordinate,

        #[arg(long)]
        osrm_url: Option<String>,

        #[arg(short, long)]
        alternatives: Option<u32>,
    },
    /// Score a trip live from sensor records streamed on stdin, one JSON object per line
    Live {
        /// Write every published result as JSON Lines
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        model: Option<PathBuf>,

        #[arg(short, long)]
        scaler: Option<PathBuf>,

        /// Interval between result refreshes when no samples arrive
        #[arg(short, long)]
        refresh_ms: Option<u64>,
    },
    /// Score a recorded trip
    Replay {
        #[arg(short, long)]
        input: PathBuf,

        /// Write every intermediate result as JSON Lines
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        model: Option<PathBuf>,

        #[arg(short, long)]
        scaler: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct TripSummary<'a> {
    #[serde(flatten)]
    result: EcoDriveResult,
    band: EcoBand,
    tips: &'a [&'a str],
    samples: usize,
    scoring_failures: u64,
}

fn load_config() -> AppConfig {
    match AppConfig::from_local_file() {
        Ok(Some(config)) => config,
        Ok(None) => AppConfig::default(),
        Err(e) => {
            warn!("Ignoring unreadable config file: {}", e);
            AppConfig::default()
        }
    }
}

fn load_scoring_model(
    model: Option<&Path>,
    scaler: Option<&Path>,
) -> Result<ScoringModel, EcoDriveError> {
    let scaler = match scaler {
        Some(path) => FeatureScaler::from_file(path)?,
        None => FeatureScaler::default(),
    };
    match model {
        Some(path) => Ok(ScoringModel::new(
            scaler,
            Box::new(LinearModelBackend::from_file(path)?),
        )),
        None => {
            info!("No model configured, using heuristic scoring");
            Ok(ScoringModel::new(scaler, Box::new(HeuristicBackend)))
        }
    }
}

fn plan(
    config: &AppConfig,
    from: Coordinate,
    to: Coordinate,
    osrm_url: Option<String>,
    alternatives: Option<u32>,
) -> Result<(), EcoDriveError> {
    let base_url = osrm_url.unwrap_or_else(|| config.osrm_base_url.clone());
    let scorer = RouteScorer::new(OsrmClient::new(&base_url)?)
        .with_alternatives(alternatives.unwrap_or(config.alternatives));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| EcoDriveError::RoutingUnavailable {
            cause: format!("could not start async runtime: {}", e),
        })?;
    let candidates = runtime.block_on(scorer.plan_routes(from, to))?;

    writer::write_json(io::stdout().lock(), &candidates)
}

fn replay(
    config: &AppConfig,
    input: &Path,
    output: Option<PathBuf>,
    model: Option<PathBuf>,
    scaler: Option<PathBuf>,
) -> Result<(), EcoDriveError> {
    if !input.exists() {
        return Err(EcoDriveError::InvalidUserInput {
            field: "input".to_string(),
            reason: format!("{:?} does not exist", input),
        });
    }

    let model = model.or_else(|| config.model_path.clone());
    let scaler = scaler.or_else(|| config.scaler_path.clone());
    let scoring = load_scoring_model(model.as_deref(), scaler.as_deref())?;
    let producer = RecordedTripProducer::from_file(input)?;

    let clock = Arc::new(ManualClock::new(0));
    let (result_tx, result_rx) = mpsc::channel::<EcoDriveResult>();
    let monitor = TripMonitor::new(
        TelemetryAggregator::new(clock.clone() as Arc<dyn Clock>),
        scoring,
        result_tx,
    );

    let result_sink = spawn_result_sink(output, result_rx);

    let samples = collect_trip(producer, &monitor, &clock)?;
    let scoring_failures = monitor.scoring().failure_count();
    monitor.shutdown();
    drop(monitor);

    print_summary(result_sink, samples, scoring_failures)
}

fn live(
    config: &AppConfig,
    output: Option<PathBuf>,
    model: Option<PathBuf>,
    scaler: Option<PathBuf>,
    refresh_ms: Option<u64>,
) -> Result<(), EcoDriveError> {
    let model = model.or_else(|| config.model_path.clone());
    let scaler = scaler.or_else(|| config.scaler_path.clone());
    let scoring = load_scoring_model(model.as_deref(), scaler.as_deref())?;
    let refresh_interval =
        Duration::from_millis(refresh_ms.unwrap_or(config.refresh_rate_ms).max(1));

    let (result_tx, result_rx) = mpsc::channel::<EcoDriveResult>();
    let monitor = TripMonitor::new(
        TelemetryAggregator::new(Arc::new(SystemClock)),
        scoring,
        result_tx,
    );
    let result_sink = spawn_result_sink(output, result_rx);

    let mut producer = StreamingTripProducer::new(io::stdin().lock());
    producer.start()?;
    monitor.start_trip()?;
    let refresher = monitor.spawn_refresh(refresh_interval);

    let mut samples = 0;
    while let Some(record) = producer.next_record()? {
        match record {
            TripRecord::Location(sample) => monitor.on_location(sample)?,
            TripRecord::Motion(sample) => monitor.on_motion(sample)?,
        }
        samples += 1;
    }

    monitor.stop_trip()?;
    let scoring_failures = monitor.scoring().failure_count();
    monitor.shutdown();
    drop(monitor);
    if refresher.join().is_err() {
        warn!("Refresh thread panicked");
    }

    print_summary(result_sink, samples, scoring_failures)
}

/// Drains published results on a separate thread, writing them to `output`
/// when given, and hands back the final one.
fn spawn_result_sink(
    output: Option<PathBuf>,
    result_rx: Receiver<EcoDriveResult>,
) -> JoinHandle<Result<Option<EcoDriveResult>, EcoDriveError>> {
    thread::spawn(move || match output {
        Some(output_file) => writer::write_results(&output_file, result_rx),
        None => Ok(result_rx.into_iter().last()),
    })
}

fn print_summary(
    result_sink: JoinHandle<Result<Option<EcoDriveResult>, EcoDriveError>>,
    samples: usize,
    scoring_failures: u64,
) -> Result<(), EcoDriveError> {
    let result = result_sink
        .join()
        .map_err(|_| EcoDriveError::WriterError {
            source: io::Error::other("result writer thread panicked"),
        })??
        .ok_or_else(|| EcoDriveError::SensorProducerError {
            description: "trip contains no samples".to_string(),
        })?;

    let summary = TripSummary {
        result,
        band: EcoBand::from_score(result.eco_score),
        tips: eco_tips(result.eco_score),
        samples,
        scoring_failures,
    };
    writer::write_json(io::stdout().lock(), &summary)
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let cli = Args::parse();
    ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    })
    .expect("Could not set Ctrl-C handler");

    let config = load_config();
    let outcome = match cli.command {
        Commands::Plan {
            from,
            to,
            osrm_url,
            alternatives,
        } => plan(&config, from, to, osrm_url, alternatives),
        Commands::Live {
            output,
            model,
            scaler,
            refresh_ms,
        } => live(&config, output, model, scaler, refresh_ms),
        Commands::Replay {
            input,
            output,
            model,
            scaler,
        } => replay(&config, &input, output, model, scaler),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
