pub mod config;
pub mod mqtt;
pub mod render;
pub mod telemetry;
pub mod ui;

use crate::config::DashboardConfig;
use crate::mqtt::{MQTTStatus, MqttHandler};
use crate::render::{RenderLoop, RenderStateMachine, WidgetLock};
use crate::telemetry::{StateMirror, TopicDispatcher};
use crate::ui::{DashboardModel, DashboardUI};
use color_eyre::{eyre::eyre, Result};
use eframe::egui;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = DashboardConfig::default_path()?;
    let config = DashboardConfig::load_or_create(&config_path).await?;
    info!("Using config {}", config_path.display());

    let mirror = Arc::new(StateMirror::new());
    let dispatcher = TopicDispatcher::new(mirror.clone(), config.topic_prefix.clone());
    let cancel = CancellationToken::new();

    // MQTT bridge
    let (status_tx, status_rx) = watch::channel(MQTTStatus::default());
    let mqtt_handler = MqttHandler::new(config.mqtt_config()?, dispatcher, status_tx);
    let mqtt_task = tokio::spawn(mqtt_handler.run(cancel.child_token()));

    // Render layer
    let widgets = Arc::new(WidgetLock::new(DashboardModel::new()));
    let machine = RenderStateMachine::new(widgets.clone(), config.blink_interval());
    let render_loop = RenderLoop::new(mirror.clone(), machine, config.render_interval());
    let render_task = tokio::spawn(render_loop.run(cancel.child_token()));

    info!("Starting dashboard window");
    let mut viewport = egui::ViewportBuilder::default()
        .with_inner_size([config.display.width, config.display.height]);
    if config.display.fullscreen {
        viewport = viewport.with_fullscreen(true);
    }
    let native_options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    let repaint_interval = config.render_interval();
    let ui_result = eframe::run_native(
        "DV8 Dashboard",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(DashboardUI::new(
                cc,
                widgets,
                mirror,
                status_rx,
                repaint_interval,
            )))
        }),
    );

    info!("Window closed, shutting down");
    cancel.cancel();
    for (name, task) in [("render loop", render_task), ("mqtt bridge", mqtt_task)] {
        if let Err(e) = task.await {
            warn!("{} ended abnormally: {}", name, e);
        }
    }

    ui_result.map_err(|e| eyre!("Dashboard window failed: {}", e))
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env()
}

fn setup_logging_env() -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    FmtSubscriber::builder()
        .with_env_filter(log_filter(rust_log.as_deref())?)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
    Ok(())
}

/// `RUST_LOG` directives, `info` when unset
fn log_filter(rust_log: Option<&str>) -> Result<EnvFilter> {
    Ok(EnvFilter::try_new(rust_log.unwrap_or("info"))?)
}
