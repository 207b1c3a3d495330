pub mod cli;
pub mod core;
pub mod models;
pub mod platform;

use anyhow::Context;
use cli::{Cli, Commands, ConfigAction};
use core::classification_loop::{ClassificationLoop, LoopSettings, Surfaces};
use core::clock::SystemClock;
use core::config::Config;
use core::inference_client::HttpInferenceClient;
use core::overlay::OverlayRenderer;
use models::session::SessionSummary;
use platform::frame_source::DirectoryFrameSource;
use platform::surface::RasterSurface;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run {
            frames,
            overlay_out,
            max_cycles,
            seed,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            let summary = runtime.block_on(run_session(
                config,
                &frames,
                overlay_out.as_deref(),
                max_cycles,
                seed,
            ))?;
            print_summary(&summary);
        }
        Commands::Config { action } => run_config(action, cli.config.as_deref())?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load().context("Failed to load config"),
    }
}

fn config_path(path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Config::get_config_path()?),
    }
}

async fn run_session(
    config: Config,
    frames_dir: &Path,
    overlay_out: Option<&Path>,
    max_cycles: Option<u64>,
    seed: Option<u64>,
) -> anyhow::Result<SessionSummary> {
    let frames = DirectoryFrameSource::open(frames_dir)
        .with_context(|| format!("Failed to open frames in {}", frames_dir.display()))?;
    let inference = HttpInferenceClient::from_config(&config)?;
    let surfaces = Surfaces {
        pose: RasterSurface::new(config.overlay_width, config.overlay_height),
        text: RasterSurface::new(config.overlay_width, config.overlay_height),
    };
    let renderer = OverlayRenderer::from_config(&config);

    info!(
        "Keypoint service: {}, classifier: {}",
        config.keypoint_service_url, config.classifier_service_url
    );

    let mut classification_loop = ClassificationLoop::new(
        LoopSettings::from_config(&config),
        frames,
        inference,
        surfaces,
        SystemClock,
    )
    .with_renderer(renderer);
    if let Some(seed) = seed {
        classification_loop = classification_loop.with_seed(seed);
    }
    info!(
        "Session {} ready, prompt seed: {:?}",
        classification_loop.session_id(),
        seed
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let summary = classification_loop.run(shutdown, max_cycles).await;

    if let Some(text) = classification_loop.surfaces().text.last_text() {
        info!("Last message: {}", text);
    }
    if let Some(path) = overlay_out {
        classification_loop
            .surfaces()
            .pose
            .save_png(path)
            .with_context(|| format!("Failed to write overlay to {}", path.display()))?;
        info!("Overlay saved to {}", path.display());
    }

    Ok(summary)
}

fn print_summary(summary: &SessionSummary) {
    println!("Session {}", summary.session_id);
    println!("  Cycles:          {}", summary.cycles);
    println!("  Classified:      {}", summary.classified_cycles);
    for (kind, count) in &summary.failures {
        println!("  {:<16} {}", format!("{}:", kind.to_string()), count);
    }
    println!("  Completed poses: {}", summary.completed_poses.join(", "));
    println!(
        "  Status:          {}",
        if summary.finished { "sequence complete" } else { "stopped" }
    );
}

fn run_config(action: ConfigAction, path: Option<&Path>) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Reset => {
            match path {
                Some(path) => Config::reset_at(path)?,
                None => Config::reset()?,
            };
            println!("Configuration reset: {}", config_path(path)?.display());
        }
        ConfigAction::Validate => {
            let target = config_path(path)?;
            match Config::load_from(&target) {
                Ok(_) => println!("Configuration is valid: {}", target.display()),
                Err(e) => anyhow::bail!("Invalid configuration {}: {}", target.display(), e),
            }
        }
    }
    Ok(())
}
