use std::path::PathBuf;
use structopt::StructOpt;

use alert_triage::classifier::ModelBundle;
use alert_triage::config::Config;
use alert_triage::engine::TriageEngine;
use alert_triage::input::read_table_file;
use alert_triage::output::{export_csv, export_filename, OutputFormat, ReportWriter};

/// Alert triage command line interface
#[derive(StructOpt, Debug)]
#[structopt(name = "triage", about = "Security log triage CLI")]
pub enum Cli {
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Analyze a log table and write the risk report
    Analyze {
        /// Path to the log table (CSV, TSV or Excel)
        #[structopt(short, long)]
        file: PathBuf,
        /// Path to the model bundle (defaults to the configured one)
        #[structopt(short, long)]
        model: Option<PathBuf>,
        /// Output format: json, jsonl or console
        #[structopt(long)]
        format: Option<String>,
        /// Output file (stdout when absent)
        #[structopt(short, long)]
        output: Option<PathBuf>,
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Write the log table back with prediction columns appended
    Export {
        /// Path to the log table (CSV, TSV or Excel)
        #[structopt(short, long)]
        file: PathBuf,
        /// Path to the model bundle (defaults to the configured one)
        #[structopt(short, long)]
        model: Option<PathBuf>,
        /// Output CSV path (defaults to pred_<name>.csv next to the input)
        #[structopt(short, long)]
        output: Option<PathBuf>,
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn load_engine(config: &Config, model: Option<PathBuf>) -> Result<TriageEngine, Box<dyn std::error::Error>> {
    let model_path = model.unwrap_or_else(|| config.model.path.clone());
    let bundle = ModelBundle::from_file(&model_path)?;
    Ok(TriageEngine::new(bundle, config.report))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let cli = Cli::from_args();

    match cli {
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
        Cli::Analyze {
            file,
            model,
            format,
            output,
            config,
        } => {
            if !file.exists() {
                eprintln!("File not found: {:?}", file);
                std::process::exit(1);
            }
            let config = Config::load_or_default(&config)?;
            let engine = load_engine(&config, model)?;

            let format: OutputFormat = format.as_deref().unwrap_or(&config.output.format).parse()?;
            let output = output.or_else(|| config.output.file_path.clone());

            let table = read_table_file(&file)?;
            let (batch, report) = engine.analyze_report(&table)?;

            let mut writer = ReportWriter::new(format, output)?;
            writer.write(&batch, &report)?;
            writer.flush()?;
        }
        Cli::Export {
            file,
            model,
            output,
            config,
        } => {
            if !file.exists() {
                eprintln!("File not found: {:?}", file);
                std::process::exit(1);
            }
            let config = Config::load_or_default(&config)?;
            let engine = load_engine(&config, model)?;

            let table = read_table_file(&file)?;
            let batch = engine.analyze(&table)?;
            let csv = export_csv(&batch)?;

            let output = output.unwrap_or_else(|| {
                let name = export_filename(file.file_name().and_then(|n| n.to_str()));
                file.with_file_name(name)
            });
            std::fs::write(&output, csv)?;
            println!("Wrote {} rows to {:?}", batch.len(), output);
        }
    }

    Ok(())
}
