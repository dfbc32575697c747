use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde_json::{Map, Value};

use fsmine::{
    CancellationToken, DatasetGenerator, DatasetLoader, GeneratorConfig, GraphWriter,
    MinerConfig, MiningError, MiningParameters, MiningWorkflow,
};

const USAGE: &str = "usage: fsmine <dataset.json> --min-support N [--max-size K] [--config FILE] \
[--params FILE] [--output FILE] [--timeout-secs S] [--embedding-counts]\n       \
fsmine --generate N --output FILE [--nodes K] [--edge-probability P] [--seed S] [--directed]";

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

#[derive(Debug, Default)]
struct CliArgs {
    dataset: Option<PathBuf>,
    min_support: Option<String>,
    max_size: Option<String>,
    config: Option<PathBuf>,
    params: Option<PathBuf>,
    output: Option<PathBuf>,
    timeout_secs: Option<u64>,
    embedding_counts: bool,
    generate: Option<usize>,
    nodes: Option<usize>,
    edge_probability: Option<f64>,
    seed: Option<u64>,
    directed: bool,
}

fn parse_args() -> Result<CliArgs> {
    let mut cli = CliArgs::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .with_context(|| format!("{flag} expects a value\n{USAGE}"))
        };
        match arg.as_str() {
            "--min-support" => cli.min_support = Some(value("--min-support")?),
            "--max-size" => cli.max_size = Some(value("--max-size")?),
            "--config" => cli.config = Some(PathBuf::from(value("--config")?)),
            "--params" => cli.params = Some(PathBuf::from(value("--params")?)),
            "--output" => cli.output = Some(PathBuf::from(value("--output")?)),
            "--timeout-secs" => {
                cli.timeout_secs = Some(value("--timeout-secs")?.parse().context("parse --timeout-secs")?)
            }
            "--embedding-counts" => cli.embedding_counts = true,
            "--generate" => cli.generate = Some(value("--generate")?.parse().context("parse --generate")?),
            "--nodes" => cli.nodes = Some(value("--nodes")?.parse().context("parse --nodes")?),
            "--edge-probability" => {
                cli.edge_probability =
                    Some(value("--edge-probability")?.parse().context("parse --edge-probability")?)
            }
            "--seed" => cli.seed = Some(value("--seed")?.parse().context("parse --seed")?),
            "--directed" => cli.directed = true,
            "-h" | "--help" => bail!("{USAGE}"),
            flag if flag.starts_with("--") => bail!("Unknown option {flag}\n{USAGE}"),
            path => {
                if cli.dataset.is_some() {
                    bail!("Unexpected extra argument: {path}\n{USAGE}");
                }
                cli.dataset = Some(PathBuf::from(path));
            }
        }
    }
    Ok(cli)
}

fn main() -> Result<()> {
    init_logging();
    let cli = parse_args()?;
    match cli.generate {
        Some(graphs) => generate(&cli, graphs),
        None => run_mining(&cli),
    }
}

fn generate(cli: &CliArgs, graphs: usize) -> Result<()> {
    let Some(output) = &cli.output else {
        bail!("--generate needs --output\n{USAGE}");
    };
    let defaults = GeneratorConfig::default();
    let config = GeneratorConfig {
        graphs,
        nodes: cli.nodes.unwrap_or(defaults.nodes),
        edge_probability: cli.edge_probability.unwrap_or(defaults.edge_probability),
        directed: cli.directed,
        seed: cli.seed,
        ..defaults
    };
    let raws = DatasetGenerator::generate(&config)?;
    GraphWriter::write_dataset(&raws, output)
        .with_context(|| format!("write generated dataset to {:?}", output))?;
    info!("Wrote {} synthetic graph(s) to {:?}", raws.len(), output);
    Ok(())
}

fn load_parameters(cli: &CliArgs) -> Result<MiningParameters> {
    let mut object = match &cli.params {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("read parameters {:?}", path))?;
            match serde_json::from_str::<Value>(&text).with_context(|| format!("parse parameters {:?}", path))? {
                Value::Object(map) => map,
                other => bail!("Parameters file must hold a JSON object, got {other}"),
            }
        }
        None => Map::new(),
    };
    // Command-line values are parsed as JSON so `2` and `0.5` keep their type.
    if let Some(raw) = &cli.min_support {
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
        object.remove("minSupport");
        object.insert("min_support".to_string(), value);
    }
    if let Some(raw) = &cli.max_size {
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
        object.remove("maxPatternSize");
        object.insert("max_pattern_size".to_string(), value);
    }
    Ok(MiningParameters::from_json_value(&Value::Object(object))?)
}

fn run_mining(cli: &CliArgs) -> Result<()> {
    let Some(dataset_path) = &cli.dataset else {
        bail!("Missing dataset path\n{USAGE}");
    };
    let config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
            MinerConfig::from_json_str(&text).with_context(|| format!("parse config {:?}", path))?
        }
        None => MinerConfig::default(),
    };
    let params = load_parameters(cli)?;

    let load_start = Instant::now();
    let root = dataset_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = dataset_path
        .file_name()
        .with_context(|| format!("dataset path {:?} names no file", dataset_path))?;
    let dataset = DatasetLoader::new(root)
        .with_policy(config.label_policy())
        .load(file_name)?;
    info!(
        "Loaded {} graph(s) from {:?} in {:?}",
        dataset.len(),
        dataset_path,
        load_start.elapsed()
    );

    let token = CancellationToken::new();
    if let Some(secs) = cli.timeout_secs {
        let watchdog = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            warn!("Timeout of {}s reached; cancelling", secs);
            watchdog.cancel();
        });
    }

    let workflow = MiningWorkflow::new(config, &dataset).with_cancellation(token);
    let result = match workflow.execute(&params) {
        Ok(result) => result,
        Err(MiningError::Cancelled { partial }) => *partial,
        Err(err) => return Err(err.into()),
    };
    if result.is_empty() {
        info!("No frequent patterns at threshold {}", result.min_support_count);
    }

    let mut report = result.to_report(&dataset);
    if cli.embedding_counts {
        for (entry, frequent) in report.patterns.iter_mut().zip(&result.patterns) {
            match workflow.embedding_counts(frequent) {
                Ok(counts) => entry.embedding_counts = Some(counts),
                Err(interrupt) => warn!("Embedding counts for {} unavailable: {}", entry.code, interrupt),
            }
        }
    }

    let json = report.to_json_string()?;
    match &cli.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("write result to {:?}", path))?;
            info!("Wrote {} pattern(s) to {:?}", report.patterns.len(), path);
        }
        None => println!("{json}"),
    }
    Ok(())
}
