//! Command handlers: bridge CLI args to the panel façade.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{debug, info};

use vigil_api::{AssumeConnected, PanelClient, TokenManager, TransportConfig};
use vigil_config::{KeyringTokenStore, Settings};
use vigil_core::{Dispatch, Panel, PanelStatus, Watchdog, epoch_ms_now};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load settings and apply CLI flag overrides.
pub fn load_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    let mut settings = vigil_config::load()?;
    if let Some(ref server) = global.server {
        settings.server = server.clone();
    }
    if let Some(ref device) = global.device {
        settings.device = device.clone();
    }
    if let Some(ref api_key) = global.api_key {
        settings.api_key = Some(api_key.clone());
    }
    Ok(settings)
}

/// Build the panel façade from resolved settings.
pub fn build_panel(settings: &Settings) -> Result<Panel, CliError> {
    let base_url = settings.server_url()?;
    let api_key: SecretString = settings.api_key()?;
    let transport = TransportConfig {
        timeout: settings.timeout(),
    };
    let connectivity = Arc::new(AssumeConnected);

    let tokens = Arc::new(TokenManager::new(
        transport.build_client().map_err(CliError::from)?,
        base_url.clone(),
        api_key,
        Arc::new(KeyringTokenStore),
        connectivity.clone(),
    ));
    tokens.load_persisted();

    let client = PanelClient::new(
        base_url,
        settings.device.clone(),
        tokens,
        connectivity,
        &transport,
    )?;
    debug!(device = %settings.device, "panel client ready");
    Ok(Panel::new(client))
}

// ── status ───────────────────────────────────────────────────────────

pub async fn status(panel: &Panel, json: bool) -> Result<(), CliError> {
    refresh_or_busy(panel).await?;
    let status = panel.status();
    if json {
        let rendered = serde_json::to_string_pretty(&status)
            .map_err(|e| CliError::Other(format!("failed to render status: {e}")))?;
        println!("{rendered}");
    } else {
        print_status(&status);
    }
    Ok(())
}

fn print_status(status: &PanelStatus) {
    let state = if status.is_alarm_triggered() {
        "TRIGGERED"
    } else if status.is_disarmed() {
        "disarmed"
    } else if status.is_arm_away() {
        "armed (away)"
    } else if status.is_arm_stay() {
        "armed (stay)"
    } else {
        "unknown"
    };

    let sensor = if status.is_pir_sensor_triggered() {
        "motion detected"
    } else if status.is_magnet_sensor_triggered() {
        "magnet tripped"
    } else if status.is_sensor_offline() {
        "offline"
    } else {
        "clear"
    };

    let connectivity = if status.is_online(epoch_ms_now()) {
        "online"
    } else {
        "OFFLINE"
    };

    println!("State:        {state}");
    println!("Sensor:       {sensor}");
    println!("Device:       {connectivity}");
    if let Some(updated) = status.last_updated() {
        println!("Last update:  {updated}");
    }
}

// ── arm / disarm ─────────────────────────────────────────────────────

pub async fn arm_away(panel: &Panel) -> Result<(), CliError> {
    match panel.arm_away().await? {
        Dispatch::Done => {
            info!("panel armed (away)");
            print_status(&panel.status());
        }
        Dispatch::Busy => print_busy(),
    }
    Ok(())
}

pub async fn arm_stay(panel: &Panel) -> Result<(), CliError> {
    match panel.arm_stay().await? {
        Dispatch::Done => {
            info!("panel armed (stay)");
            print_status(&panel.status());
        }
        Dispatch::Busy => print_busy(),
    }
    Ok(())
}

pub async fn disarm(panel: &Panel) -> Result<(), CliError> {
    match panel.disarm().await? {
        Dispatch::Done => {
            info!("panel disarmed");
            print_status(&panel.status());
        }
        Dispatch::Busy => print_busy(),
    }
    Ok(())
}

fn print_busy() {
    println!("Another operation is in flight; try again in a moment.");
}

// ── watch ────────────────────────────────────────────────────────────

pub async fn watch(panel: Panel, settings: &Settings) -> Result<(), CliError> {
    refresh_or_busy(&panel).await?;
    print_status(&panel.status());
    println!("Watching (poll every {}s, Ctrl-C to stop)...", settings.poll_interval_secs);

    let watchdog = Watchdog::spawn(panel, settings.poll_interval());
    let mut notifications = watchdog.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = notifications.recv() => match received {
                Ok(notification) => println!("{notification}"),
                // Lagged just means we missed ticks; keep listening.
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    watchdog.shutdown();
    watchdog.join().await;
    Ok(())
}

async fn refresh_or_busy(panel: &Panel) -> Result<(), CliError> {
    if panel.refresh().await? == Dispatch::Busy {
        return Err(CliError::Other("panel is busy, try again".into()));
    }
    Ok(())
}
