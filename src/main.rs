//! TEP Sentinel binary entrypoint: loads config, wires up every subsystem,
//! spawns the real-time Driver loop, and serves the Orchestrator API until
//! shutdown.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tep_sentinel::api::{build_router, AppState};
use tep_sentinel::baseline::BaselineStore;
use tep_sentinel::broadcast::Broadcaster;
use tep_sentinel::control::ControlPlane;
use tep_sentinel::driver::Driver;
use tep_sentinel::frame_buffer::Window;
use tep_sentinel::llm::{Dispatcher, HttpProvider, Provider};
use tep_sentinel::simulator::SyntheticTep;
use tep_sentinel::storage::AnalysisStore;
use tep_sentinel::{config, types::SpeedPreset};
use tokio_util::sync::CancellationToken;

/// TEP Sentinel: real-time process monitoring with PCA anomaly detection
/// and LLM-assisted fault dispatch.
#[derive(Parser, Debug)]
#[command(name = "tep-sentinel", version, about)]
struct Cli {
    /// Path to the baseline model artifact.
    #[arg(long, env = "TEP_SENTINEL_BASELINE", default_value = "baseline.json")]
    baseline: String,

    /// Address to bind the HTTP server to. Overrides the config file value.
    #[arg(long, env = "TEP_SENTINEL_ADDR")]
    addr: Option<String>,

    /// Path to a TOML config file. Overrides TEP_SENTINEL_CONFIG and the
    /// default `tep_sentinel.toml` lookup.
    #[arg(long)]
    config: Option<String>,

    /// Initial driver speed preset.
    #[arg(long, value_enum, default_value = "real")]
    speed: SpeedArg,

    /// Deterministic seed for the synthetic simulator stand-in.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Wipe the data directory (analysis store) before starting, the same
    /// way the teacher's `--reset-db`/`RESET_DB` gate drops prior history.
    #[arg(long, env = "TEP_SENTINEL_RESET_DATA")]
    reset_data: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SpeedArg {
    Real,
    Fast,
    Demo,
}

impl From<SpeedArg> for SpeedPreset {
    fn from(arg: SpeedArg) -> Self {
        match arg {
            SpeedArg::Real => SpeedPreset::Real,
            SpeedArg::Fast => SpeedPreset::Fast,
            SpeedArg::Demo => SpeedPreset::Demo,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    if let Some(path) = &cli.config {
        std::env::set_var("TEP_SENTINEL_CONFIG", path);
    }
    let mut app_config = config::AppConfig::load()?;
    if let Some(addr) = cli.addr {
        app_config.server_addr = addr;
    }
    let server_addr = app_config.server_addr.clone();
    let data_dir = app_config.data_dir.clone();
    config::init(app_config);
    let cfg = config::get();

    if cli.reset_data {
        tracing::warn!(dir = %data_dir, "--reset-data set, wiping prior analysis history");
        if let Err(err) = std::fs::remove_dir_all(&data_dir) {
            if err.kind() != std::io::ErrorKind::NotFound {
                return Err(err.into());
            }
        }
    }

    let window = Arc::new(Window::new(cfg.window_size));
    let control = Arc::new(ControlPlane::new());
    control.set_speed_preset(cli.speed.into());
    let baseline = Arc::new(BaselineStore::load_initial(&cli.baseline)?);
    let broadcaster = Arc::new(Broadcaster::new(cfg.sse_queue_depth, cfg.sse_k_error));
    let store = Arc::new(AnalysisStore::new(format!("{data_dir}/analyses")));

    let providers: Vec<Arc<dyn Provider>> = cfg
        .providers
        .iter()
        .map(|p| Arc::new(HttpProvider::new(p)) as Arc<dyn Provider>)
        .collect();
    if providers.is_empty() {
        tracing::warn!("no LLM providers configured; fault dispatch will produce empty analyses");
    }

    let dispatcher = Arc::new(Dispatcher::spawn(
        providers,
        store.clone(),
        broadcaster.clone(),
        cfg.dispatch_queue_depth,
        Duration::from_secs(cfg.dispatch_min_interval_secs),
        Duration::from_secs(cfg.provider_timeout_secs),
        cfg.jaccard_threshold,
    ));

    let driver = Arc::new(Driver::new(
        window.clone(),
        control.clone(),
        baseline.clone(),
        broadcaster.clone(),
        dispatcher.clone(),
    ));

    let shutdown = CancellationToken::new();

    let run_loop_driver = driver.clone();
    let run_loop_shutdown = shutdown.clone();
    let simulator = Box::new(SyntheticTep::new(cli.seed, cfg.interval_real_secs));
    let run_loop_handle = tokio::spawn(async move {
        run_loop_driver
            .run_loop(
                simulator,
                |preset| match preset {
                    SpeedPreset::Real => Duration::from_secs_f64(config::get().interval_real_secs),
                    SpeedPreset::Fast => Duration::from_secs_f64(config::get().interval_fast_secs),
                    SpeedPreset::Demo => Duration::from_secs_f64(config::get().interval_demo_secs),
                },
                run_loop_shutdown,
            )
            .await;
    });

    let state = AppState {
        window,
        control,
        baseline,
        broadcaster,
        dispatcher,
        store,
        driver: driver.clone(),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&server_addr).await?;
    tracing::info!(addr = %server_addr, "tep-sentinel listening");

    let server_shutdown = shutdown.clone();
    let shutdown_driver = driver.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let ctrl_c = async {
                tokio::signal::ctrl_c()
                    .await
                    .expect("failed to install Ctrl+C handler");
            };
            #[cfg(unix)]
            let terminate = async {
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler")
                    .recv()
                    .await;
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                () = ctrl_c => {}
                () = terminate => {}
            }
            tracing::info!("shutdown signal received, stopping driver and dispatcher, draining run loop");
            // Driver::stop() is the cascade root (§2): it idles the state
            // machine and cancels pending/in-flight LLM dispatches, writing
            // a Suppressed record for whatever was in flight. Cancelling
            // `shutdown` afterward lets the run_loop task itself return.
            shutdown_driver.stop();
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = run_loop_handle.await;
    Ok(())
}
