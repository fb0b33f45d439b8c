use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::thread;

use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::append::Append;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use rusty_phi::analysis::archive::MemoryArchive;
use rusty_phi::analysis::event::AnalysisEvent;
use rusty_phi::analysis::scheduler::Scheduler;
use rusty_phi::analysis::store::MemoryResultStore;
use rusty_phi::analysis::task::{AnalysisConfig, AnalysisTask};
use rusty_phi::error::AnalysisError;

#[derive(Parser, Debug)]
struct Args {
    /// The archive to analyze (JSON). If omitted, a random archive is sampled
    #[arg(long)]
    archive: Option<PathBuf>,
    /// The number of neurons of the random archive
    #[arg(short = 'N', long, default_value = "8")]
    num_neurons: usize,
    /// The number of inputs per neuron of the random archive
    #[arg(short = 'K', long, default_value = "3")]
    num_inputs: usize,
    /// The number of time steps of the random archive
    #[arg(short = 'T', long, default_value = "100")]
    num_time_steps: usize,
    /// The probability for a neuron of the random archive to ignore its inputs
    #[arg(long, default_value = "0.05")]
    noise: f64,
    /// The seed used for archive sampling
    #[arg(long, default_value = "0")]
    seed: u64,
    /// The ID of the analysis
    #[arg(long, default_value = "1")]
    entity_id: u32,
    /// The first time step to analyze (default: the second archived time step)
    #[arg(long)]
    first: Option<u32>,
    /// The last time step to analyze (default: the last archived time step)
    #[arg(long)]
    last: Option<u32>,
    /// The number of time steps analyzed concurrently
    #[arg(short = 'j', long, default_value = "4")]
    threads: usize,
    /// The analysis configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where to save the complexes (JSON). If omitted, they are printed
    #[arg(long)]
    output: Option<PathBuf>,
    /// Where to write the log. If omitted, the log goes to the console
    #[arg(long)]
    log: Option<PathBuf>,
}

fn init_logging(args: &Args) -> Result<(), AnalysisError> {
    let encoder = Box::new(PatternEncoder::new("{d(%H:%M:%S%.3f)} {l} [{T}] - {m}\n"));
    let appender: Box<dyn Append> = match &args.log {
        Some(path) => Box::new(
            FileAppender::builder()
                .encoder(encoder)
                .build(path)
                .map_err(|e| AnalysisError::IOError(e.to_string()))?,
        ),
        None => Box::new(ConsoleAppender::builder().encoder(encoder).build()),
    };

    let config = Config::builder()
        .appender(Appender::builder().build("main", appender))
        .build(Root::builder().appender("main").build(LevelFilter::Info))
        .map_err(|e| AnalysisError::IOError(e.to_string()))?;

    log4rs::init_config(config).map_err(|e| AnalysisError::IOError(e.to_string()))?;
    Ok(())
}

fn main() -> Result<(), AnalysisError> {
    let args = Args::parse();
    init_logging(&args)?;
    log::info!("{:?}", args);

    let archive = match &args.archive {
        Some(path) => MemoryArchive::load_from(path)?,
        None => MemoryArchive::rand(
            args.num_neurons,
            args.num_inputs,
            args.num_time_steps,
            args.noise,
            args.seed,
        )?,
    };
    let time_steps = archive.time_steps();
    log::info!(
        "Archive loaded: {} neurons over {} time steps",
        archive.num_neurons(),
        time_steps.len()
    );

    let config = match &args.config {
        Some(path) => AnalysisConfig::load_from(path)?,
        None => AnalysisConfig::default(),
    };
    log::info!("{:?}", config);

    // The first time step has no history to learn from
    let first = args
        .first
        .or_else(|| time_steps.get(1).or(time_steps.first()).copied())
        .ok_or_else(|| AnalysisError::InvalidTask("The archive is empty".to_string()))?;
    let last = args
        .last
        .or_else(|| time_steps.last().copied())
        .ok_or_else(|| AnalysisError::InvalidTask("The archive is empty".to_string()))?;
    let task = AnalysisTask::new(args.entity_id, first, last, args.threads);

    let (tx, rx) = channel();
    let observer = thread::spawn(move || {
        let mut num_complexes = 0usize;
        for event in rx {
            match event {
                AnalysisEvent::Progress {
                    message,
                    time_step,
                    units_completed,
                    total_units,
                } => log::debug!(
                    "{} (time step {}: {}/{})",
                    message,
                    time_step,
                    units_completed,
                    total_units
                ),
                AnalysisEvent::ResultFound { complex } => {
                    num_complexes += 1;
                    log::info!(
                        "Complex found at time step {}: {:?} with phi {:.3}",
                        complex.time_step,
                        complex.neuron_ids,
                        complex.phi
                    );
                }
                AnalysisEvent::WorkerStarted { .. } => {}
                AnalysisEvent::WorkerFinished { time_step, state } => {
                    log::debug!("Time step {} finished: {:?}", time_step, state)
                }
            }
        }
        num_complexes
    });

    let store = MemoryResultStore::new();
    let mut scheduler = Scheduler::new(archive, store.clone(), config).with_events(tx);
    scheduler.prepare(task)?;
    scheduler.run()?;
    let failure = scheduler.error_message().map(str::to_string);
    drop(scheduler);

    let num_complexes = observer.join().unwrap_or_default();
    if let Some(message) = failure {
        log::error!("Analysis failed: {}", message);
        eprintln!("Analysis failed: {}", message);
        std::process::exit(1);
    }
    log::info!("Analysis done: {} complexes found", num_complexes);

    match &args.output {
        Some(path) => {
            store.save_to(path)?;
            log::info!("Complexes saved to {}", path.display());
        }
        None => {
            let complexes = store.complexes(args.entity_id)?;
            let json = serde_json::to_string_pretty(&complexes)
                .map_err(|e| AnalysisError::IOError(e.to_string()))?;
            println!("{}", json);
        }
    }
    Ok(())
}
