//! Hybrid memory-hierarchy simulator CLI.
//!
//! Drives a full simulation from the command line:
//! 1. **Configs:** One configuration file for a PCM-only system, or two
//!    for a hybrid system (DRAM first, PCM second).
//! 2. **Traces:** One trace file per simulated core; memory traces
//!    (`<addr> R|W`) and CPU traces (`eip LOAD|STORE|EXE [addr]`) are
//!    detected automatically.
//! 3. **Stats:** A plain-text `key = value` report, with an optional
//!    JSON snapshot next to it.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hybridsim_core::Simulator;
use hybridsim_core::config::Config;
use hybridsim_core::sim::{RequestProbe, Stats};

#[derive(Parser, Debug)]
#[command(
    name = "hybridsim",
    author,
    version,
    about = "Cycle-accurate hybrid DRAM/PCM memory-hierarchy simulator",
    long_about = "Replay memory or CPU traces against a configurable cache stack \
backed by PCM main memory (optionally paired with DRAM).\n\nExamples:\n  \
hybridsim --config configs/pcm.cfg --traces traces/mix.trace\n  \
hybridsim --config configs/dram.cfg configs/pcm.cfg --traces t0.trace t1.trace \
--stats-output run.stats"
)]
struct Cli {
    /// Configuration file(s); with two, the first is DRAM and the
    /// second PCM (hybrid mode).
    #[arg(long = "config", num_args = 1..=2, required = true)]
    configs: Vec<PathBuf>,

    /// One trace file per simulated core.
    #[arg(long = "traces", num_args = 1.., required = true)]
    traces: Vec<PathBuf>,

    /// Where to write the stats report.
    #[arg(long = "stats-output", default_value = "sim.stats")]
    stats_output: PathBuf,

    /// Also write a JSON snapshot next to the stats report.
    #[arg(long)]
    json: bool,

    /// Record every completed memory request to this CSV file.
    #[arg(long = "request-trace")]
    request_trace: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("hybridsim: {err}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut configs = Vec::new();
    for path in &cli.configs {
        let path = path.to_string_lossy();
        configs.push(Config::from_file(&path)?);
    }
    let (dram_cfg, pcm_cfg) = match configs.as_slice() {
        [pcm] => (None, pcm),
        [dram, pcm] => (Some(dram), pcm),
        _ => unreachable!("clap bounds --config to one or two files"),
    };

    let traces: Vec<String> = cli
        .traces
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    println!("Memory controller: {:?}", pcm_cfg.mem_controller_type);
    println!(
        "PCM system: {} GB, {} channel(s), {} rank(s), {} bank(s)",
        pcm_cfg.size_in_gb(),
        pcm_cfg.num_of_channels,
        pcm_cfg.num_of_ranks,
        pcm_cfg.num_of_banks
    );
    if dram_cfg.is_some() {
        println!("Hybrid mode: DRAM partner enabled");
    }
    println!("Cores: {}", traces.len());

    let mut sim = Simulator::new(dram_cfg, pcm_cfg, &traces)?;
    if let Some(path) = &cli.request_trace {
        sim.attach_request_probe(RequestProbe::create(path)?);
    }
    let summary = sim.run()?;

    println!("Execution time (cycles): {}", summary.cycles);
    println!("Retired references: {}", summary.retired);

    let mut stats = Stats::new();
    sim.register_stats(&mut stats);
    stats.write_text(&cli.stats_output)?;
    println!("Stats written to {}", cli.stats_output.display());

    if cli.json {
        let json_path = cli.stats_output.with_extension("json");
        stats.write_json(&json_path, pcm_cfg)?;
        println!("JSON snapshot written to {}", json_path.display());
    }

    Ok(())
}
