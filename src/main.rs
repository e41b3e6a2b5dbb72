// ------------------------------------------------------------
// External dependencies
// ------------------------------------------------------------

use showdown_bot::config::{self, Config};
use showdown_bot::connection::{ConnectionManager, WsConnector};
use showdown_bot::metrics::METRICS;
use showdown_bot::outbound::Outbox;
use showdown_bot::router::{InboundRouter, LoggingHandler};

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, LevelFilter};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

/// Minimum spacing between two outbound transmissions.
const MESSAGE_THROTTLE: Duration = Duration::from_millis(650);

/// Period of the metrics summary line.
const METRICS_INTERVAL: Duration = Duration::from_secs(60);

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Responsibilities:
// - Initialize logging
// - Load and validate configuration
// - Wire outbox, router and connection manager together
// - Keep the connection alive until Ctrl-C or a fatal config error
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var_os("RUST_LOG").is_some();
    init_logging(rust_log);

    let path = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "config.json".to_string()),
    );

    let config: Config = config::load(&path)?;
    if !rust_log {
        log::set_max_level(config.log_level());
    }

    // --------------------------------------------------------
    // An unusable command character is fatal, both here and
    // on every hot reload.
    // --------------------------------------------------------
    if let Err(e) = config.validate() {
        error!("{}", e);
        return Err(e.into());
    }

    info!("starting server");

    let watch_config = config.watchconfig;
    let (settings_tx, settings) = watch::channel(Arc::new(config));

    let outbox = Outbox::new(MESSAGE_THROTTLE);
    let router = InboundRouter::new(
        Arc::new(LoggingHandler::new(settings.clone())),
        outbox.clone(),
    );
    let manager = ConnectionManager::new(settings, Arc::new(WsConnector), outbox, router);

    // --------------------------------------------------------
    // Start metrics reporter (periodic, low-noise)
    // --------------------------------------------------------
    tokio::spawn(async {
        loop {
            sleep(METRICS_INTERVAL).await;
            debug!("[METRICS] {}", METRICS.summary());
        }
    });

    let reload = async {
        if watch_config {
            config::watch_for_changes(path, settings_tx).await
        } else {
            futures_util::future::pending().await
        }
    };

    tokio::select! {
        _ = manager.run() => {}
        result = reload => result?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    Ok(())
}

// ------------------------------------------------------------
// Logging
// ------------------------------------------------------------
//
// env_logger with everything enabled at the backend; the actual
// verbosity is the global max level, which follows `debuglevel`
// and can change on reload. RUST_LOG, when set, takes over.
//
fn init_logging(rust_log: bool) {
    let mut builder = env_logger::Builder::new();
    builder.format_timestamp_millis();

    if rust_log {
        builder.parse_default_env();
    } else {
        builder.filter_level(LevelFilter::Trace);
    }

    builder.init();

    if !rust_log {
        log::set_max_level(LevelFilter::Info);
    }
}
