//! Configuration loading for rowcc

use crate::cli::Cli;
use anyhow::{Context, Result};
use rowcc_core::{EngineConfig, Strategy};
use std::fs;
use std::path::Path;

/// What the binary will run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    /// Engine configuration shared by every run
    pub engine: EngineConfig,
    /// Strategies to run each batch under, in order
    pub strategies: Vec<Strategy>,
}

/// Load an engine configuration file; `.json` files are JSON, anything
/// else is TOML
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("invalid JSON config {}", path.display()))?,
        _ => toml::from_str(&text)
            .with_context(|| format!("invalid TOML config {}", path.display()))?,
    };
    Ok(config)
}

/// Combine the config file (if any) with CLI overrides.
///
/// Without `--strategy` the serial baseline runs first, followed by the
/// configured strategy.
pub fn resolve(cli: &Cli) -> Result<RunPlan> {
    let mut engine = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    if let Some(rows) = cli.rows {
        engine.row_count = rows;
    }

    let mut strategies = match &cli.strategy {
        Some(list) => list.clone(),
        None => vec![Strategy::Serial, engine.strategy],
    };
    if let Some(partitions) = cli.partitions {
        for strategy in strategies.iter_mut() {
            if let Strategy::PartitionedPipeline { partitions: p } = strategy {
                *p = partitions;
            }
        }
        if let Strategy::PartitionedPipeline { partitions: p } = &mut engine.strategy {
            *p = partitions;
        }
    }
    strategies.dedup();

    engine.validate().context("invalid engine configuration")?;
    for strategy in &strategies {
        EngineConfig {
            strategy: *strategy,
            ..engine.clone()
        }
        .validate()
        .with_context(|| format!("strategy {} does not fit {} rows", strategy, engine.row_count))?;
    }

    Ok(RunPlan { engine, strategies })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(suffix: &str) -> NamedTempFile {
        tempfile::Builder::new().suffix(suffix).tempfile().unwrap()
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("rowcc").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_without_config() {
        let plan = resolve(&cli(&[])).unwrap();
        assert_eq!(plan.engine, EngineConfig::default());
        assert_eq!(plan.strategies, vec![Strategy::Serial, Strategy::OrderedTwoPhase]);
    }

    #[test]
    fn test_toml_config() {
        let mut file = temp_file(".toml");
        writeln!(file, "row_count = 40\nstrategy = \"pipeline:8\"").unwrap();

        let plan = resolve(&cli(&["--config", file.path().to_str().unwrap()])).unwrap();
        assert_eq!(plan.engine.row_count, 40);
        assert_eq!(plan.strategies, vec![Strategy::Serial, Strategy::pipeline(8)]);
    }

    #[test]
    fn test_json_config_with_overrides() {
        let mut file = temp_file(".json");
        write!(file, r#"{{"row_count": 10, "strategy": "pipeline"}}"#).unwrap();

        let plan = resolve(&cli(&[
            "--config",
            file.path().to_str().unwrap(),
            "--rows",
            "20",
            "--partitions",
            "5",
        ]))
        .unwrap();
        assert_eq!(plan.engine.row_count, 20);
        assert_eq!(plan.engine.strategy, Strategy::pipeline(5));
        assert_eq!(plan.strategies, vec![Strategy::Serial, Strategy::pipeline(5)]);
    }

    #[test]
    fn test_too_many_partitions_rejected() {
        assert!(resolve(&cli(&["--rows", "3", "--strategy", "pipeline:4"])).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Path::new("/nonexistent/rowcc.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn test_malformed_config_file() {
        let mut file = temp_file(".toml");
        writeln!(file, "row_count = \"many\"").unwrap();
        assert!(load_config(file.path()).is_err());
    }
}
