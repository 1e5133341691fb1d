use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quill_value::{serialize, unserialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::EnvFilter;

mod config;
mod dump;
mod json;

#[derive(Parser)]
#[command(name = "quill", version, about = "Inspect and convert PHP serialized payloads")]
struct Cli {
    /// Path to quill.toml (searched upward from the working directory by default)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a serialized payload and print it
    Decode {
        file: PathBuf,
        /// Print JSON instead of the debug tree
        #[arg(long)]
        json: bool,
    },
    /// Encode a JSON document as a serialized payload
    Encode {
        file: PathBuf,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode, re-encode and compare with the original bytes
    Check { file: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    let _guard = config.runtime.clone().install();

    match cli.command {
        Commands::Decode { file, json } => decode(&file, json, &config.output)?,
        Commands::Encode { file, output } => encode(&file, output.as_deref())?,
        Commands::Check { file } => check(&file)?,
    }

    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn decode(path: &Path, as_json: bool, output: &config::OutputConfig) -> Result<()> {
    let value = unserialize(&read(path)?)
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    if as_json {
        let json = json::to_json(&value);
        let text = if output.pretty {
            serde_json::to_string_pretty(&json)?
        } else {
            serde_json::to_string(&json)?
        };
        println!("{text}");
    } else {
        print!("{}", dump::dump(&value, output.indent));
    }
    Ok(())
}

fn encode(path: &Path, output: Option<&Path>) -> Result<()> {
    let source = read(path)?;
    let json: serde_json::Value = serde_json::from_slice(&source)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let bytes = serialize(&json::from_json(&json));

    match output {
        Some(out) => std::fs::write(out, &bytes)
            .with_context(|| format!("Failed to write {}", out.display()))?,
        None => std::io::stdout().write_all(&bytes)?,
    }
    tracing::debug!(len = bytes.len(), "encoded payload");
    Ok(())
}

fn check(path: &Path) -> Result<()> {
    let original = read(path)?;
    let value = unserialize(&original)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    let encoded = serialize(&value);

    if encoded == original {
        tracing::info!(path = %path.display(), len = original.len(), "round trip is byte-identical");
        return Ok(());
    }
    let offset = encoded
        .iter()
        .zip(&original)
        .position(|(a, b)| a != b)
        .unwrap_or(encoded.len().min(original.len()));
    anyhow::bail!(
        "{}: re-encoded payload differs at byte {offset} ({} bytes in, {} bytes out)",
        path.display(),
        original.len(),
        encoded.len()
    )
}
