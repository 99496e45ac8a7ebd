//! jjnet lattice CLI
//!
//! Builds a lattice from a config file (or defaults), applies the configured
//! perturbation in a dry run with no solver steps, and reports what was
//! built. Configured tracers only join the dry run with `--trace`.

use clap::Parser;
use jjnet_core::GridSize;
use jjnet_sim::{SimConfig, SimResult, TopologyExport};
use std::path::PathBuf;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// jjnet lattice builder
#[derive(Parser, Debug)]
#[command(name = "jjnet-sim")]
#[command(about = "Build and inspect Josephson junction lattice networks")]
struct Args {
    /// JSON run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Lattice size in nodes, overriding the config
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    size: Option<Vec<usize>>,

    /// Master seed, overriding the config
    #[arg(short, long)]
    seed: Option<u64>,

    /// Export the built topology to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Run the configured tracers in the dry run. This creates their
    /// output files (header-only traces, flux sections).
    #[arg(long)]
    trace: bool,
}

struct Outcome {
    config: SimConfig,
    tracers: usize,
    contacts: [usize; 3],
    circuits: [usize; 3],
    boundary_contacts: usize,
    inner_contacts: usize,
}

fn build(args: &Args) -> SimResult<Outcome> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(size) = &args.size {
        config.grid = GridSize::new(size[0], size[1], size[2]);
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    debug!("Effective config: {:?}", config);

    let configured_tracers = config.tracers.len();
    let mut dry = config.clone();
    if !args.trace {
        dry.tracers.clear();
    }
    let (mut ctx, summary) = dry.build_context()?;

    // Dry run: the lifecycle without any solver steps.
    let schedule = config.schedule;
    ctx.begin_run(schedule.start, schedule.start, schedule.dt)?;
    ctx.finish_run()?;

    let export = TopologyExport::new(ctx.network(), config.seed, config.grid, summary);
    if let Some(path) = &args.export {
        export.write_to_file(path)?;
        info!("Exported topology to {}", path);
    }

    Ok(Outcome {
        contacts: summary.contacts,
        circuits: summary.circuits,
        boundary_contacts: export.contact_classes.boundary,
        inner_contacts: export.contact_classes.inner,
        tracers: configured_tracers,
        config,
    })
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("jjnet lattice builder v{}", env!("CARGO_PKG_VERSION"));
    }

    let outcome = match build(&args) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let grid = outcome.config.grid;
    if args.json {
        let summary = serde_json::json!({
            "seed": outcome.config.seed,
            "grid": [grid.x, grid.y, grid.z],
            "contacts": {
                "x": outcome.contacts[0],
                "y": outcome.contacts[1],
                "z": outcome.contacts[2],
                "boundary": outcome.boundary_contacts,
                "inner": outcome.inner_contacts,
            },
            "circuits": {
                "x": outcome.circuits[0],
                "y": outcome.circuits[1],
                "z": outcome.circuits[2],
            },
            "tracers": outcome.tracers,
            "traced": args.trace,
            "perturbed": outcome.config.perturbation.is_some(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("Lattice {}x{}x{} (seed {})", grid.x, grid.y, grid.z, outcome.config.seed);
        info!(
            "  contacts: {} ({} boundary, {} inner)",
            outcome.contacts.iter().sum::<usize>(),
            outcome.boundary_contacts,
            outcome.inner_contacts
        );
        info!("  circuits: {}", outcome.circuits.iter().sum::<usize>());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jjnet_sim::TracerConfig;

    fn config_file(dir: &std::path::Path) -> PathBuf {
        let config = SimConfig {
            tracers: vec![TracerConfig::Voltage {
                tag_expr: String::new(),
                file_template: Some(dir.join("u.{index}").to_string_lossy().into_owned()),
            }],
            ..Default::default()
        };
        let path = dir.join("run.json");
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        path
    }

    fn trace_count(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().starts_with("u."))
            .count()
    }

    #[test]
    fn test_dry_run_skips_tracers_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file(dir.path());
        let args = Args::parse_from(["jjnet-sim", "--config", path.to_str().unwrap(), "--size", "2", "2", "2"]);

        let outcome = build(&args).unwrap();
        assert_eq!(outcome.tracers, 1);
        assert_eq!(trace_count(dir.path()), 0);
    }

    #[test]
    fn test_trace_flag_opens_tracer_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file(dir.path());
        let args = Args::parse_from([
            "jjnet-sim",
            "--config",
            path.to_str().unwrap(),
            "--size",
            "2",
            "2",
            "2",
            "--trace",
        ]);

        build(&args).unwrap();
        assert_eq!(trace_count(dir.path()), 12);
    }
}
