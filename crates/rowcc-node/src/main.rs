//! rowcc demo binary
//!
//! Runs the demo batches under the selected strategies and prints each
//! history with its serializability verdict.

mod cli;
mod config;
mod fixtures;
mod output;

use anyhow::Result;
use cli::Cli;
use fixtures::Input;
use rowcc_core::{verify_serializability, Engine, EngineConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // logs go to stderr so stdout carries only the demo output
    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(&cli.log_level, cli.json_logs);

    let plan = config::resolve(&cli)?;
    tracing::info!(
        rows = plan.engine.row_count,
        strategies = ?plan.strategies,
        "rowcc starting"
    );

    // one engine per strategy, reused across steps like separate databases
    let engines = plan
        .strategies
        .iter()
        .map(|strategy| {
            let engine = Engine::with_config(EngineConfig {
                strategy: *strategy,
                ..plan.engine.clone()
            })?;
            Ok((*strategy, engine))
        })
        .collect::<Result<Vec<_>>>()?;

    let steps = fixtures::fixtures(
        cli.scenario,
        cli.seed,
        cli.random_transactions,
        plan.engine.row_count,
    )?;
    for step in steps {
        println!("{}", output::heading(&step.title));
        match step.input {
            Input::Batch(batch) => {
                for (strategy, engine) in &engines {
                    engine.reset_log();
                    let report = engine.run(batch.clone(), *strategy)?;
                    let log = engine.log();
                    let verdict = verify_serializability(&log);
                    output::print_run(*strategy, &report, &log, &engine.rows(), &verdict);
                }
            }
            Input::Log(log) => {
                print!("{}", output::history(&log));
                println!("{}", verify_serializability(&log));
            }
        }
    }

    if cli.metrics {
        for (strategy, engine) in &engines {
            println!("{} metrics:", strategy);
            println!("{}", engine.metrics_snapshot().to_json()?);
        }
    }

    Ok(())
}
