// src/main.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::info;

use netstate_recorder::archive::run_archiver;
use netstate_recorder::config::Config;
use netstate_recorder::core::{RecorderContext, Source};
use netstate_recorder::pipeline::Pipeline;
use netstate_recorder::poller::{PollerConfig, run_poller, service_alive};
use netstate_recorder::writer::{WriterConfig, run_writer};

fn main() -> Result<()> {
    let cfg_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "recorder.toml".into());

    let cfg = Config::load(&cfg_path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cfg.log_level.as_str()),
    )
    .format_timestamp_millis()
    .init();

    info!("[recorder] loaded {}", cfg_path);
    info!(
        "[recorder] service: {}, request interval: {}s, storage interval: {}s",
        cfg.service.base_url, cfg.recorder.request_interval_secs, cfg.recorder.storage_interval_secs
    );

    // ------------------------------------------------------------
    // Startup precondition
    // ------------------------------------------------------------
    if !service_alive(&cfg.flow_url()) {
        bail!("service at {} is not reachable", cfg.service.base_url);
    }

    std::fs::create_dir_all(&cfg.recorder.output_dir)
        .with_context(|| format!("creating output dir '{}'", cfg.recorder.output_dir))?;

    // ------------------------------------------------------------
    // Graceful shutdown (SIGINT + SIGTERM)
    // ------------------------------------------------------------
    let ctx = Arc::new(RecorderContext::new());
    {
        let ctx = ctx.clone();
        ctrlc::set_handler(move || {
            info!("[recorder] shutdown requested");
            ctx.shutdown.request_stop();
        })?;
    }

    // ------------------------------------------------------------
    // Pipeline tasks
    // ------------------------------------------------------------
    let mut pipeline = Pipeline::new();

    for source in Source::ALL {
        start_poller(&mut pipeline, &ctx, &cfg, source);
        start_writer(&mut pipeline, &ctx, &cfg, source);
    }
    start_archiver(&mut pipeline, &ctx);

    info!("[recorder] running – Ctrl+C to stop");

    while !ctx.shutdown.is_stopping() {
        std::thread::sleep(Duration::from_millis(100));
    }

    // ------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------
    info!("[recorder] shutting down…");
    pipeline.join_all(cfg.shutdown_grace())?;
    ctx.shutdown.mark_drained();

    // kurze Gnadenfrist, damit die letzten Logzeilen noch landen
    std::thread::sleep(Duration::from_secs(2));
    info!("[recorder] stopped");

    Ok(())
}

//
// ============================================================
// START_* HELPERS
// ============================================================
//

fn start_poller(pipeline: &mut Pipeline, ctx: &Arc<RecorderContext>, cfg: &Config, source: Source) {
    let poller_cfg = PollerConfig {
        url: match source {
            Source::Flow => cfg.flow_url(),
            Source::Graph => cfg.graph_url(),
        },
        params: match source {
            Source::Flow => Vec::new(),
            Source::Graph => cfg
                .service
                .graph_params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        },
        request_interval: cfg.request_interval(),
    };

    info!("[recorder] poller {} → {}", source, poller_cfg.url);

    let ctx = ctx.clone();
    pipeline.spawn(&format!("poller:{}", source), move || {
        run_poller(ctx, source, poller_cfg)
    });
}

fn start_writer(pipeline: &mut Pipeline, ctx: &Arc<RecorderContext>, cfg: &Config, source: Source) {
    let writer_cfg = WriterConfig {
        output_dir: PathBuf::from(&cfg.recorder.output_dir),
        storage_interval: cfg.storage_interval(),
    };

    let ctx = ctx.clone();
    pipeline.spawn(&format!("writer:{}", source), move || {
        run_writer(ctx, source, writer_cfg)
    });
}

fn start_archiver(pipeline: &mut Pipeline, ctx: &Arc<RecorderContext>) {
    let ctx = ctx.clone();
    pipeline.spawn("archiver", move || run_archiver(ctx));
}
