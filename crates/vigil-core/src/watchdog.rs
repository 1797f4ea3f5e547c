// Background polling loop.
//
// A dedicated long-lived task refreshes the panel at a fixed interval and
// classifies each cycle's outcome into at most one notification. Started
// once at application entry; production never cancels it -- the panel is a
// permanent background watchdog that lives until the process exits. The
// cancellation token exists for tests and orderly shutdown only.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::inbox::NotificationInbox;
use crate::panel::{Dispatch, Panel};
use crate::status::{ArmMethod, PanelStatus, epoch_ms_now};

/// Fixed poll interval: matches the device's own 120-second update cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(120);

const NOTIFY_CHANNEL_SIZE: usize = 16;

/// Why a triggered alarm fired, selected by priority from the sensor code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmReason {
    Pir,
    Magnet,
    SensorOffline,
    InvalidReading,
}

/// One classified poll outcome, rendered to text for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    RequestFailed,
    Offline,
    AlarmTriggered(AlarmReason),
    StateChanged {
        armed: bool,
        method: Option<ArmMethod>,
    },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed => write!(f, "Status request failed"),
            Self::Offline => write!(f, "Security device is offline"),
            Self::AlarmTriggered(reason) => {
                let detail = match reason {
                    AlarmReason::Pir => "motion detected",
                    AlarmReason::Magnet => "magnet sensor tripped",
                    AlarmReason::SensorOffline => "sensor offline",
                    AlarmReason::InvalidReading => "invalid sensor reading",
                };
                write!(f, "Alarm triggered: {detail}")
            }
            Self::StateChanged { armed: false, .. } => {
                write!(f, "Alarm state changed: disarmed")
            }
            Self::StateChanged {
                armed: true,
                method,
            } => {
                write!(f, "Alarm state changed: armed")?;
                match method {
                    Some(ArmMethod::Away) => write!(f, " (away)"),
                    Some(ArmMethod::Stay) => write!(f, " (stay)"),
                    Some(ArmMethod::None) | None => Ok(()),
                }
            }
        }
    }
}

/// Classify a refreshed snapshot into at most one notification.
///
/// Priority: offline beats everything; a triggered alarm beats a state
/// change; the alarm reason picks the highest-priority sensor
/// interpretation (PIR over magnet over sensor-offline), with unrecognized
/// sensor codes reported as an invalid reading.
fn classify(status: &PanelStatus, now_ms: i64) -> Option<Notification> {
    if !status.is_online(now_ms) {
        return Some(Notification::Offline);
    }

    if status.is_alarm_triggered() {
        let reason = if status.is_pir_sensor_triggered() {
            AlarmReason::Pir
        } else if status.is_magnet_sensor_triggered() {
            AlarmReason::Magnet
        } else if status.is_sensor_offline() {
            AlarmReason::SensorOffline
        } else {
            AlarmReason::InvalidReading
        };
        return Some(Notification::AlarmTriggered(reason));
    }

    if status.state_changed() {
        return Some(Notification::StateChanged {
            armed: !status.is_disarmed(),
            method: status.method().filter(|m| *m != ArmMethod::None),
        });
    }

    None
}

/// Handle to the spawned polling loop.
pub struct Watchdog {
    notify_tx: broadcast::Sender<Notification>,
    inbox: Arc<Mutex<NotificationInbox>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Watchdog {
    /// Spawn the polling loop on the current tokio runtime.
    pub fn spawn(panel: Panel, interval: Duration) -> Self {
        let (notify_tx, _) = broadcast::channel(NOTIFY_CHANNEL_SIZE);
        let inbox = Arc::new(Mutex::new(NotificationInbox::new()));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_task(
            panel,
            interval,
            notify_tx.clone(),
            Arc::clone(&inbox),
            cancel.clone(),
        ));
        Self {
            notify_tx,
            inbox,
            cancel,
            handle,
        }
    }

    /// Subscribe to the notification stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }

    /// The current digest of rendered messages, oldest first.
    pub fn digest(&self) -> Vec<String> {
        self.inbox.lock().expect("inbox lock poisoned").messages()
    }

    /// Reset the digest once the notification surface is empty.
    pub fn acknowledge_all(&self) {
        self.inbox
            .lock()
            .expect("inbox lock poisoned")
            .acknowledge_all();
    }

    /// Stop the loop. Tests and orderly shutdown only; production lets the
    /// watchdog run for the life of the process.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to exit after [`shutdown`](Self::shutdown).
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

async fn poll_task(
    panel: Panel,
    period: Duration,
    notify_tx: broadcast::Sender<Notification>,
    inbox: Arc<Mutex<NotificationInbox>>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let notification = match panel.refresh().await {
                    Err(e) => {
                        warn!(error = %e, "watchdog refresh failed");
                        Some(Notification::RequestFailed)
                    }
                    // A command holds the guard; its own refresh will
                    // resynchronize, so this tick's effects are suppressed.
                    Ok(Dispatch::Busy) => {
                        debug!("watchdog tick skipped -- command in flight");
                        None
                    }
                    Ok(Dispatch::Done) => {
                        let status = panel.status();
                        let classified = classify(&status, epoch_ms_now());
                        if matches!(classified, Some(Notification::StateChanged { .. })) {
                            panel.clear_state_changed();
                        }
                        classified
                    }
                };

                if let Some(notification) = notification {
                    debug!(%notification, "watchdog notification");
                    inbox
                        .lock()
                        .expect("inbox lock poisoned")
                        .push(notification.to_string());
                    let _ = notify_tx.send(notification);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::LIVENESS_WINDOW_MS;

    fn fresh_status(state: f64, method: f64, sensor: f64) -> PanelStatus {
        let mut status = PanelStatus::default();
        status.apply(state, method, sensor, 1_000_000);
        status
    }

    #[test]
    fn offline_beats_everything() {
        let status = fresh_status(2.0, 0.0, 1.0);
        let stale = 1_000_000 + LIVENESS_WINDOW_MS;
        assert_eq!(classify(&status, stale), Some(Notification::Offline));
    }

    #[test]
    fn triggered_alarm_reports_pir_first() {
        let status = fresh_status(2.0, 0.0, 1.0);
        assert_eq!(
            classify(&status, 1_000_001),
            Some(Notification::AlarmTriggered(AlarmReason::Pir))
        );
    }

    #[test]
    fn triggered_alarm_reports_magnet() {
        let status = fresh_status(2.0, 0.0, 2.0);
        assert_eq!(
            classify(&status, 1_000_001),
            Some(Notification::AlarmTriggered(AlarmReason::Magnet))
        );
    }

    #[test]
    fn triggered_alarm_reports_sensor_offline() {
        let status = fresh_status(2.0, 0.0, 3.0);
        assert_eq!(
            classify(&status, 1_000_001),
            Some(Notification::AlarmTriggered(AlarmReason::SensorOffline))
        );
    }

    #[test]
    fn triggered_alarm_with_unknown_sensor_is_invalid_reading() {
        let status = fresh_status(2.0, 0.0, 7.0);
        assert_eq!(
            classify(&status, 1_000_001),
            Some(Notification::AlarmTriggered(AlarmReason::InvalidReading))
        );
    }

    #[test]
    fn state_change_reports_armed_with_method() {
        // Disarmed first, then armed away -- the flip sets the edge flag.
        let mut status = PanelStatus::default();
        status.apply(0.0, 0.0, 0.0, 1_000_000);
        status.clear_state_changed();
        status.apply(1.0, 2.0, 0.0, 1_000_000);

        let notification = classify(&status, 1_000_001);
        assert_eq!(
            notification,
            Some(Notification::StateChanged {
                armed: true,
                method: Some(ArmMethod::Away),
            })
        );
        assert_eq!(
            notification.map(|n| n.to_string()).as_deref(),
            Some("Alarm state changed: armed (away)")
        );
    }

    #[test]
    fn state_change_reports_disarmed() {
        let mut status = PanelStatus::default();
        status.apply(1.0, 2.0, 0.0, 1_000_000);
        status.apply(0.0, 0.0, 0.0, 1_000_000);

        let notification = classify(&status, 1_000_001);
        assert_eq!(
            notification.map(|n| n.to_string()).as_deref(),
            Some("Alarm state changed: disarmed")
        );
    }

    #[test]
    fn quiet_cycle_produces_nothing() {
        let mut status = fresh_status(1.0, 1.0, 0.0);
        status.clear_state_changed();
        assert_eq!(classify(&status, 1_000_001), None);
    }

    #[test]
    fn notification_text() {
        assert_eq!(
            Notification::RequestFailed.to_string(),
            "Status request failed"
        );
        assert_eq!(
            Notification::Offline.to_string(),
            "Security device is offline"
        );
        assert_eq!(
            Notification::AlarmTriggered(AlarmReason::InvalidReading).to_string(),
            "Alarm triggered: invalid sensor reading"
        );
        assert_eq!(
            Notification::StateChanged {
                armed: true,
                method: Some(ArmMethod::Stay)
            }
            .to_string(),
            "Alarm state changed: armed (stay)"
        );
    }
}
