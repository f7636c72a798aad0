use std::sync::Arc;

use anyhow::{Context, Result};
use kiosk_core::{PresenceDetector, ScrfdDetector};
use kiosk_hw::{Camera, FrameSource};
use kiosk_session::status::MSG_CAMERA_FAILED;
use kiosk_session::{HttpTokenIssuer, KioskPersona, SessionCoordinator, StatusBoard};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod lifecycle;
mod pipeline;
mod renderer;

use config::Config;
use dbus_interface::KioskService;
use lifecycle::Lifecycle;
use renderer::RendererConnector;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "kioskd starting");

    let config = Config::from_env()?;
    let persona = KioskPersona::load(config.persona_path.as_deref())
        .context("failed to load persona")?;
    tracing::info!(
        persona = %persona.persona.name,
        product = %persona.product.model,
        "persona loaded"
    );

    let status = StatusBoard::new();
    let conn = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;

    let coordinator = SessionCoordinator::new(
        Arc::new(HttpTokenIssuer::new(config.auth_config())?),
        Arc::new(RendererConnector::new(conn.clone())),
        persona.persona_config(),
        config.coordinator_config(persona.intro()),
        status.clone(),
    );
    let lifecycle = Lifecycle::new(
        FrameSource::new(&config.preview_target),
        coordinator.clone(),
        status.clone(),
    );

    let model_path = config.scrfd_model_path();
    match ScrfdDetector::load(&model_path)
        .map(|d| d.with_confidence_threshold(config.min_confidence))
    {
        Ok(detector) => {
            tracing::info!(path = %model_path, "SCRFD detector loaded");
            let detector = PresenceDetector::new(detector).with_min_confidence(config.min_confidence);
            let device = config.camera_device.clone();
            let fps = config.camera_fps;
            if let Err(e) = lifecycle
                .start(move || Camera::open(&device, fps), detector, config.absence_threshold)
                .await
            {
                tracing::error!(device = %config.camera_device, error = %e, "frame pipeline not started");
            }
        }
        Err(e) => {
            tracing::error!(path = %model_path, error = %e, "failed to load presence model");
            match config.fallback_start {
                Some(delay) => lifecycle.start_fallback(delay),
                None => status.update(|s| {
                    s.message = MSG_CAMERA_FAILED.to_string();
                    s.last_error = Some(e.to_string());
                }),
            }
        }
    }

    conn.object_server()
        .at(dbus_interface::OBJECT_PATH, KioskService::new(coordinator, status))
        .await?;
    conn.request_name(dbus_interface::BUS_NAME)
        .await
        .with_context(|| format!("failed to acquire {}", dbus_interface::BUS_NAME))?;

    tracing::info!(bus_name = dbus_interface::BUS_NAME, "kioskd ready");

    let result = shutdown_signal().await;
    tracing::info!("kioskd shutting down");
    lifecycle.teardown().await;

    result
}

/// Wait for Ctrl-C or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        r = tokio::signal::ctrl_c() => r?,
        _ = term.recv() => {}
    }
    Ok(())
}
