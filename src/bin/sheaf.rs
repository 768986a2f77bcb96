//! `sheaf`: cluster review opinions from a JSON file.
//!
//! Reads either a JSON array of `{text, metadata}` items or an opinion-card
//! document, runs the clustering pipeline, and writes two files into the
//! output directory:
//!
//! - `clustering_results_<ts>.json`
//! - `dendrogram_tree_<ts>.json`
//!
//! Exit code 1 on any error.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use sheaf::{embed, load_items, pipeline, ClusteringConfig};

/// Hierarchical clustering of review-opinion texts
#[derive(Parser)]
#[command(name = "sheaf")]
#[command(version)]
#[command(about = "Hierarchical clustering of review-opinion texts")]
struct Cli {
    /// Input JSON: an array of items or an opinion-card document
    input: PathBuf,

    /// Directory for the output files
    #[arg(short, long, default_value = "clustering_output")]
    output_dir: PathBuf,

    /// Config file (.toml, .yaml or .json); flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sentence-transformer directory (needs the `candle` feature);
    /// without it the built-in hashing embedder runs
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Dimension of the built-in hashing embedder
    #[arg(long)]
    dims: Option<usize>,

    /// Cut height for flat clusters
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Linkage method: average, complete, single, ward
    #[arg(short, long)]
    linkage: Option<String>,

    /// Clusters smaller than this count as small
    #[arg(long)]
    min_cluster_size: Option<usize>,

    /// Fold small clusters into their nearest large one
    #[arg(long)]
    reassign_small_clusters: bool,

    /// Texts per embedding call
    #[arg(long)]
    batch_size: Option<usize>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn load_config(&self) -> Result<ClusteringConfig> {
        let mut config = match &self.config {
            Some(path) => ClusteringConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ClusteringConfig::default(),
        };
        if let Some(dir) = &self.model_dir {
            config.embedding_model_path = Some(dir.clone());
        }
        if let Some(dims) = self.dims {
            config.hashing_dims = dims;
        }
        if let Some(t) = self.threshold {
            config.distance_threshold = t;
        }
        if let Some(l) = &self.linkage {
            config.linkage_method = l.clone();
        }
        if let Some(m) = self.min_cluster_size {
            config.min_cluster_size = m;
        }
        if self.reassign_small_clusters {
            config.reassign_small_clusters = true;
        }
        config.embedding_batch_size = self.batch_size.unwrap_or(config.embedding_batch_size);
        Ok(config)
    }
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote output");
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.load_config()?;
    let items = load_items(&cli.input)
        .with_context(|| format!("failed to read items from {}", cli.input.display()))?;

    let embedder = embed::from_config(&config).context("failed to set up the embedder")?;
    let timestamp = Utc::now();
    let out = pipeline::run_at(&config, &items, embedder.as_ref(), timestamp)
        .context("clustering run failed")?;

    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("failed to create {}", cli.output_dir.display()))?;
    let stamp = timestamp.format("%Y%m%d_%H%M%S");
    write_json(
        &cli.output_dir.join(format!("clustering_results_{stamp}.json")),
        &out.result,
    )?;
    write_json(
        &cli.output_dir.join(format!("dendrogram_tree_{stamp}.json")),
        &out.dendrogram,
    )?;

    println!(
        "{} items -> {} clusters (threshold {}, {} linkage)",
        out.result.clustering_info.n_samples,
        out.result.clustering_info.n_clusters,
        config.distance_threshold,
        out.result.clustering_info.linkage_method,
    );
    if let Some(s) = out.result.evaluation_metrics.silhouette_score {
        println!("silhouette: {s:.4}");
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        tracing::error!("{e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
