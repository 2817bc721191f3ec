// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Walzwerk command line: compress a PDF and report the outcome.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use walzwerk_core::{
    CancelToken, CompressionLevel, CompressionSettings, CompressorConfig, GrowthPolicy, Strategy,
};
use walzwerk_document::Compressor;

#[derive(Parser, Debug)]
#[command(name = "walzwerk", version, about = "PDF compressor")]
struct Args {
    /// Input PDF.
    input: PathBuf,

    /// Output path. Defaults to `<input>.compressed.pdf`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Quality/size preset.
    #[arg(short, long, default_value = "balanced")]
    level: CompressionLevelArg,

    /// Compression strategy.
    #[arg(short, long, default_value = "auto")]
    strategy: StrategyArg,

    /// Keep the engine result even when it is larger than the input.
    #[arg(long)]
    accept_growth: bool,

    /// Reject inputs larger than this many mebibytes.
    #[arg(long, default_value_t = 200)]
    max_input_mb: usize,

    /// JSON file overriding the preset's per-image settings.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emit the result summary as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum CompressionLevelArg {
    SmallSize,
    Balanced,
    HighQuality,
    Extreme,
}

impl From<CompressionLevelArg> for CompressionLevel {
    fn from(arg: CompressionLevelArg) -> Self {
        match arg {
            CompressionLevelArg::SmallSize => Self::SmallSize,
            CompressionLevelArg::Balanced => Self::Balanced,
            CompressionLevelArg::HighQuality => Self::HighQuality,
            CompressionLevelArg::Extreme => Self::Extreme,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum StrategyArg {
    InPlace,
    Rasterize,
    Auto,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::InPlace => Self::InPlace,
            StrategyArg::Rasterize => Self::Rasterize,
            StrategyArg::Auto => Self::Auto,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let level = CompressionLevel::from(args.level);
    let strategy = Strategy::from(args.strategy);

    let input = fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;

    let settings: CompressionSettings = match &args.settings {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading settings {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing settings {}", path.display()))?
        }
        None => level.settings(),
    };

    let compressor = Compressor::new(CompressorConfig {
        max_input_size: args.max_input_mb * 1024 * 1024,
        growth_policy: if args.accept_growth {
            GrowthPolicy::AcceptResult
        } else {
            GrowthPolicy::NeverGrow
        },
    });

    let cancel = CancelToken::new();
    let report = compressor
        .compress_with(&input, &settings, level, strategy, &cancel, |p| {
            debug!(
                stage = ?p.stage,
                completed = p.completed,
                total = p.total,
                "progress"
            );
        })
        .context("compression failed")?;

    let output = args.output.unwrap_or_else(|| {
        let mut path = args.input.clone();
        path.set_extension("compressed.pdf");
        path
    });
    fs::write(&output, &report.bytes)
        .with_context(|| format!("writing {}", output.display()))?;

    if args.json {
        println!(
            "{}",
            serde_json::json!({
                "output": output.display().to_string(),
                "original_size": report.original_size,
                "compressed_size": report.compressed_size,
                "ratio_percent": report.compression_ratio(),
                "method": report.method,
            })
        );
    } else {
        println!(
            "{} -> {} ({:.2} MiB -> {:.2} MiB, {:.1}% saved, {:?})",
            args.input.display(),
            output.display(),
            report.original_size as f64 / (1024.0 * 1024.0),
            report.compressed_size as f64 / (1024.0 * 1024.0),
            report.compression_ratio(),
            report.method,
        );
    }
    Ok(())
}
