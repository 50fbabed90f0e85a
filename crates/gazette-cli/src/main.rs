//! gazette CLI - Command-line interface
//!
//! Usage:
//!   gazette compile --config gazette.toml
//!   gazette parse --config gazette.toml --text "a white refrigerator"
//!   gazette inspect --config gazette.toml --shard 0 --layer lower

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use gazette_core::{AppConfig, AttributeFilter, LoggingConfig, ProgressSink};
use gazette_recognizer::{CompileOptions, CompileReport, DictionarySpec, Model};
use serde_json::json;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "gazette")]
#[command(about = "Dictionary-based entity recognizer")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment only when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DictionaryArgs {
    /// Dictionary file, overriding `dictionary.path`
    #[arg(short, long)]
    dictionary: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the dictionary and print the compile report
    Compile {
        #[command(flatten)]
        source: DictionaryArgs,
    },
    /// Compile the dictionary and recognize entities in text
    Parse {
        #[command(flatten)]
        source: DictionaryArgs,
        /// Text to parse
        #[arg(long, conflicts_with = "input")]
        text: Option<String>,
        /// File whose content is parsed
        #[arg(long)]
        input: Option<PathBuf>,
        /// Only rows with this attribute (name=value)
        #[arg(long)]
        include: Vec<String>,
        /// Skip rows with this attribute (name=value)
        #[arg(long)]
        exclude: Vec<String>,
        /// Attribute names to return
        #[arg(long)]
        out: Vec<String>,
    },
    /// Compile the dictionary and print one trie
    Inspect {
        #[command(flatten)]
        source: DictionaryArgs,
        #[arg(long, default_value_t = 0)]
        shard: usize,
        /// Normalizer layer (default normalizer when omitted)
        #[arg(long)]
        layer: Option<String>,
    },
}

/// Forwards progress notifications to the log
struct LogProgress;

impl ProgressSink for LogProgress {
    fn status(&self, message: &str) {
        debug!("{}", message);
    }

    fn progress(&self, percent: u8) {
        debug!("Progress: {}%", percent);
    }
}

fn init_tracing(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);
    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path)
            .and_then(AppConfig::with_env_override)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => AppConfig::from_env().context("Failed to load configuration from environment"),
    }
}

fn compile(config: &AppConfig, source: &DictionaryArgs) -> anyhow::Result<(Model, CompileReport)> {
    let path = match source.dictionary.as_ref().or(config.dictionary.path.as_ref()) {
        Some(path) => path.clone(),
        None => bail!("No dictionary given (use --dictionary or dictionary.path)"),
    };
    let spec = DictionarySpec::compile(&config.dictionary.fields)
        .context("Invalid dictionary field definitions")?;

    let mut model = Model::from_config(config)?.with_progress(Arc::new(LogProgress));
    let report = model
        .compile_file(&path, spec, CompileOptions::from_config(config))
        .with_context(|| format!("Failed to compile {}", path.display()))?;
    Ok((model, report))
}

fn build_filter(include: &[String], exclude: &[String], out: &[String]) -> anyhow::Result<AttributeFilter> {
    let mut filter = AttributeFilter::none();
    for pair in include {
        let (name, value) = AttributeFilter::parse_pair(pair)?;
        filter = filter.include(name, value);
    }
    for pair in exclude {
        let (name, value) = AttributeFilter::parse_pair(pair)?;
        filter = filter.exclude(name, value);
    }
    for name in out {
        filter = filter.output(name.as_str());
    }
    Ok(filter)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Compile { source } => {
            let (_, report) = compile(&config, &source)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Parse {
            source,
            text,
            input,
            include,
            exclude,
            out,
        } => {
            let text = match (text, input) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => bail!("Nothing to parse (use --text or --input)"),
            };
            let filter = build_filter(&include, &exclude, &out)?;
            let (model, _) = compile(&config, &source)?;

            let entities = model.recognize(&text, &filter)?;
            info!("Recognized {} entities", entities.len());
            println!("{}", serde_json::to_string_pretty(&entities)?);
        }
        Commands::Inspect {
            source,
            shard,
            layer,
        } => {
            let (model, _) = compile(&config, &source)?;
            let layer = match layer.or_else(|| model.default_normalizer().map(str::to_string)) {
                Some(layer) => layer,
                None => bail!("Model has no normalizers"),
            };
            let Some(selected) = model.shards().get(shard) else {
                bail!("Shard {} does not exist ({} shards)", shard, model.shards().len());
            };
            let Some(trie) = selected.layer(&layer) else {
                bail!("Shard {} has no layer '{}'", shard, layer);
            };
            let view = json!({
                "shard": shard,
                "layer": layer,
                "rows": selected.rows(),
                "compressed": selected.is_compressed(),
                "word_separator": selected.word_separator().to_string(),
                "tokenizer_option": selected.tokenizer_option(),
                "nodes": trie.node_count(),
                "trie": trie.snapshot(),
            });
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }

    Ok(())
}
