//! logbatch – ship stdin lines through the `log` facade into a batched sink.
//
//  $ some-program | logbatch --config logbatch.toml
//  $ LOGBATCH_CONFIG=prod.toml logbatch
use std::fs::OpenOptions;
use std::io::{self, BufRead, BufWriter};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use logbatch::config::SinkConfig;
use logbatch::{load_config, logging::init_logging, Config, DeliveryService, JsonLinesWriter, LogHook};

#[derive(Debug, Parser)]
#[command(name = "logbatch", version, about = "Batch stdin lines into a log sink")]
struct Cli {
    /// Path to config TOML (env LOGBATCH_CONFIG overrides)
    #[arg(short, long, default_value = "logbatch.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let cfg_path: String = std::env::var("LOGBATCH_CONFIG").unwrap_or(cli.config);
    let cfg: Config =
        load_config(&cfg_path).with_context(|| format!("failed to load config {cfg_path}"))?;

    let service = match &cfg.sink {
        SinkConfig::Stdout => DeliveryService::new(cfg.service, JsonLinesWriter::new(io::stdout())),
        SinkConfig::File { path } => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open sink file {path}"))?;
            DeliveryService::new(cfg.service, JsonLinesWriter::new(BufWriter::new(file)))
        }
    };
    let service = Arc::new(service);
    service.start()?;

    let hook = LogHook::new(Arc::clone(&service), cfg.record.converter(), cfg.record.max_level);
    hook.install()
        .context("another logger is already installed")?;
    info!(config = %cfg_path, sink = ?cfg.sink, "logbatch started");

    // Producers block on a full queue; keep them off the runtime workers.
    let lines = tokio::task::spawn_blocking(|| -> io::Result<u64> {
        let mut count = 0u64;
        for line in io::stdin().lock().lines() {
            let line = line?;
            count += 1;
            log::info!(line = count; "{}", line);
        }
        Ok(count)
    })
    .await??;

    let outcome = hook.close(cfg.shutdown_timeout).await;
    let stats = hook.stats();
    info!(
        lines,
        admitted = stats.admitted,
        timed_out = stats.timed_out,
        delivered = stats.delivered_records,
        failed = stats.failed_records,
        "logbatch finished"
    );
    outcome?;
    Ok(())
}
