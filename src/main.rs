//! Memoria CLI
//!
//! Inspect and maintain a memoization cache on disk.
//!
//! ```text
//! memoria --path /var/cache/memoria inspect
//! memoria --path /var/cache/memoria --capacity 512mb warm
//! memoria --path /var/cache/memoria get --namespace fit '["model", 3]'
//! memoria --path /var/cache/memoria delete --namespace fit '["model", 3]'
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use memoria::durable::DiskEntry;
use memoria::{CacheConfig, Error, Result, TieredCache};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Memoria - two-tier memoization cache tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "MEMORIA_CONFIG")]
    config: Option<PathBuf>,

    /// Disk tier root (overrides the configuration file)
    #[arg(long, env = "MEMORIA_PATH")]
    path: Option<PathBuf>,

    /// Memory tier budget, e.g. 512mb (overrides the configuration file)
    #[arg(long, env = "MEMORIA_CAPACITY")]
    capacity: Option<String>,

    /// Log every cache operation at info level
    #[arg(long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Entry counts and bytes on disk per namespace
    Inspect,
    /// Load persisted entries into memory and report the outcome
    Warm,
    /// Print the stored value of a JSON item
    Get {
        /// Slash-separated child path, e.g. fit/predict
        #[arg(long, default_value = "")]
        namespace: String,
        /// The item as JSON
        item: String,
    },
    /// Delete the stored value of a JSON item
    Delete {
        /// Slash-separated child path, e.g. fit/predict
        #[arg(long, default_value = "")]
        namespace: String,
        /// The item as JSON
        item: String,
    },
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;
    info!("Opening cache at {:?}", config.path);

    match &args.command {
        Command::Inspect => inspect(config),
        Command::Warm => warm(config),
        Command::Get { namespace, item } => get(config, namespace, item),
        Command::Delete { namespace, item } => delete(config, namespace, item),
    }
}

fn load_config(args: &Args) -> Result<CacheConfig> {
    let mut config = match &args.config {
        Some(path) => CacheConfig::from_yaml_file(path)?,
        None => CacheConfig::default(),
    };
    if let Some(path) = &args.path {
        config.path = Some(path.clone());
    }
    if let Some(capacity) = &args.capacity {
        config.capacity = Some(capacity.as_str().into());
    }
    if args.verbose {
        config.verbose = true;
    }
    if config.path.is_none() {
        return Err(Error::InvalidConfiguration(
            "a disk path is required (--path or `path:` in the config file)".into(),
        ));
    }
    // Subcommands decide when to hydrate
    config.hydrate = false;
    Ok(config)
}

// =============================================================================
// Commands
// =============================================================================

fn inspect(config: CacheConfig) -> Result<()> {
    let cache = TieredCache::new(config)?;
    println!("{:<40} {:>10} {:>14} {:>11}", "NAMESPACE", "ENTRIES", "BYTES", "INCOMPLETE");
    inspect_node(&cache)
}

fn inspect_node(node: &TieredCache) -> Result<()> {
    let disk = match node.disk() {
        Some(disk) => disk,
        None => return Ok(()),
    };

    let mut entries = 0usize;
    let mut bytes = 0u64;
    let mut incomplete = 0usize;
    let mut children = Vec::new();

    for entry in disk.scan()? {
        match entry {
            DiskEntry::Item { path, .. } => {
                entries += 1;
                bytes += disk.size_of(&path)?;
            }
            DiskEntry::Incomplete { .. } => incomplete += 1,
            DiskEntry::Child { name, .. } => children.push(name),
        }
    }

    println!(
        "{:<40} {:>10} {:>14} {:>11}",
        node.namespace().to_string(),
        entries,
        bytes,
        incomplete
    );

    for name in children {
        let child = node.child(&name)?;
        inspect_node(&child)?;
    }
    Ok(())
}

fn warm(config: CacheConfig) -> Result<()> {
    let cache = TieredCache::new(config)?;
    let report = cache.hydrate()?;

    println!("loaded:    {}", report.loaded);
    println!("pruned:    {}", report.pruned);
    println!("saturated: {}", report.saturated);
    println!("cache:     {}", cache.describe());
    Ok(())
}

fn get(config: CacheConfig, namespace: &str, item: &str) -> Result<()> {
    let item: Value = serde_json::from_str(item)?;
    let node = Arc::new(TieredCache::new(config)?).descend(namespace)?;

    let value: Value = node.get(&item)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn delete(config: CacheConfig, namespace: &str, item: &str) -> Result<()> {
    let item: Value = serde_json::from_str(item)?;
    let node = Arc::new(TieredCache::new(config)?).descend(namespace)?;

    let key = node.key(&item)?;
    node.as_store().delete(&key)?;
    println!("deleted {}", key);
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

// =============================================================================
// Tests
// =============================================================================
