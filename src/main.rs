use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use rayon::ThreadPoolBuilder;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use waste_classifier::batch::{classify_files, collect_image_files, BatchSummary};
use waste_classifier::{Classifier, Config, ModelLoader};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> Result<ExitCode> {
    let config = Config::parse();
    init_tracing();

    if config.threads > 0 {
        ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()?;
    }

    let source = config.model_source()?;
    let loader = Arc::new(ModelLoader::new(source, config.loader_config()));
    let classifier = Classifier::new(loader, config.classifier_config());
    classifier.preload();

    let paths = collect_image_files(&config.inputs);
    ensure!(!paths.is_empty(), "No images found in the given inputs");

    let outcomes = classify_files(&classifier, &paths, config.locale, true);

    let mut out = io::stdout().lock();
    for outcome in &outcomes {
        let written = if config.pretty {
            serde_json::to_writer_pretty(&mut out, outcome)
        } else {
            serde_json::to_writer(&mut out, outcome)
        };
        written.with_context(|| format!("Failed to write result for {}", outcome.path.display()))?;
        writeln!(out)?;
    }

    let summary = BatchSummary::from_outcomes(&outcomes);
    info!(
        total = summary.total,
        classified = summary.classified,
        rejected = summary.rejected,
        degraded = summary.degraded,
        low_confidence = summary.low_confidence,
        "done"
    );

    Ok(if summary.rejected > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
