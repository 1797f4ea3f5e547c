// Decoded panel state.
//
// The remote store holds three numeric variables that together describe the
// panel: arm state, arm method, and sensor condition. This module decodes
// the raw codes into enums and aggregates them into `PanelStatus`, the one
// snapshot type every consumer reads.

use chrono::{Local, TimeZone};
use serde::Serialize;

/// Maximum allowed staleness of the device heartbeat before it is
/// considered offline. The device pushes its status every 120 seconds;
/// the extra 60 seconds absorb network delay.
pub const LIVENESS_WINDOW_MS: i64 = 180 * 1000;

/// Display format for the "last updated" text.
const LAST_UPDATED_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

fn decode_code(code: f64) -> Option<i64> {
    let rounded = code.round();
    if (code - rounded).abs() > f64::EPSILON {
        return None;
    }
    #[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
    Some(rounded as i64)
}

/// The panel's arm state variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArmState {
    Disarmed,
    Armed,
    Triggered,
}

impl ArmState {
    /// Decode a raw variable value; unrecognized codes decode to `None`.
    pub fn from_code(code: f64) -> Option<Self> {
        match decode_code(code)? {
            0 => Some(Self::Disarmed),
            1 => Some(Self::Armed),
            2 => Some(Self::Triggered),
            _ => None,
        }
    }

    /// The numeric code written to the remote variable.
    pub fn code(self) -> f64 {
        match self {
            Self::Disarmed => 0.0,
            Self::Armed => 1.0,
            Self::Triggered => 2.0,
        }
    }
}

/// How the panel was armed. Only meaningful while armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArmMethod {
    None,
    Stay,
    Away,
}

impl ArmMethod {
    pub fn from_code(code: f64) -> Option<Self> {
        match decode_code(code)? {
            0 => Some(Self::None),
            1 => Some(Self::Stay),
            2 => Some(Self::Away),
            _ => None,
        }
    }

    pub fn code(self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Stay => 1.0,
            Self::Away => 2.0,
        }
    }
}

/// The sensor condition variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SensorState {
    Clear,
    PirTriggered,
    MagnetTriggered,
    Offline,
}

impl SensorState {
    pub fn from_code(code: f64) -> Option<Self> {
        match decode_code(code)? {
            0 => Some(Self::Clear),
            1 => Some(Self::PirTriggered),
            2 => Some(Self::MagnetTriggered),
            3 => Some(Self::Offline),
            _ => None,
        }
    }

    pub fn code(self) -> f64 {
        match self {
            Self::Clear => 0.0,
            Self::PirTriggered => 1.0,
            Self::MagnetTriggered => 2.0,
            Self::Offline => 3.0,
        }
    }
}

/// One logical snapshot of the panel.
///
/// The three decoded readings are always applied together: a refresh that
/// fails partway leaves the previous snapshot fully intact. `None` in a
/// decoded field means the variable was never fetched or carried an
/// unrecognized code.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PanelStatus {
    state: Option<ArmState>,
    method: Option<ArmMethod>,
    sensor: Option<SensorState>,
    last_activity_ms: i64,
    state_changed: bool,
    last_updated: Option<String>,
}

impl PanelStatus {
    /// Apply a complete three-variable snapshot.
    ///
    /// Sets the change-edge flag when the disarmed/armed boundary flips.
    /// The flag is sticky: further refreshes with no flip leave it set, and
    /// only [`clear_state_changed`](Self::clear_state_changed) resets it.
    pub(crate) fn apply(
        &mut self,
        state_code: f64,
        method_code: f64,
        sensor_code: f64,
        last_activity_ms: i64,
    ) {
        let was_disarmed = self.is_disarmed();

        self.state = ArmState::from_code(state_code);
        self.method = ArmMethod::from_code(method_code);
        self.sensor = SensorState::from_code(sensor_code);
        self.last_activity_ms = last_activity_ms;
        self.last_updated = format_last_updated(last_activity_ms);

        if was_disarmed != self.is_disarmed() {
            self.state_changed = true;
        }
    }

    // ── Stored readings ──────────────────────────────────────────────

    pub fn state(&self) -> Option<ArmState> {
        self.state
    }

    pub fn method(&self) -> Option<ArmMethod> {
        self.method
    }

    pub fn sensor(&self) -> Option<SensorState> {
        self.sensor
    }

    /// Epoch millis of the device's last heartbeat, from the most recent
    /// successful `state` fetch.
    pub fn last_activity_ms(&self) -> i64 {
        self.last_activity_ms
    }

    /// Human-readable timestamp of the last heartbeat.
    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    // ── Change edge ──────────────────────────────────────────────────

    /// `true` from the refresh that flipped disarmed/armed until a
    /// consumer clears it.
    pub fn state_changed(&self) -> bool {
        self.state_changed
    }

    pub(crate) fn clear_state_changed(&mut self) {
        self.state_changed = false;
    }

    // ── Derived state ────────────────────────────────────────────────

    pub fn is_disarmed(&self) -> bool {
        self.state == Some(ArmState::Disarmed)
    }

    pub fn is_alarm_triggered(&self) -> bool {
        self.state == Some(ArmState::Triggered)
    }

    pub fn is_arm_stay(&self) -> bool {
        self.method == Some(ArmMethod::Stay)
    }

    pub fn is_arm_away(&self) -> bool {
        self.method == Some(ArmMethod::Away)
    }

    pub fn is_pir_sensor_triggered(&self) -> bool {
        self.sensor == Some(SensorState::PirTriggered)
    }

    pub fn is_magnet_sensor_triggered(&self) -> bool {
        self.sensor == Some(SensorState::MagnetTriggered)
    }

    pub fn is_sensor_offline(&self) -> bool {
        self.sensor == Some(SensorState::Offline)
    }

    /// Whether the device heartbeat is within the liveness window.
    /// A staleness of exactly the window counts as offline.
    pub fn is_online(&self, now_ms: i64) -> bool {
        now_ms - self.last_activity_ms < LIVENESS_WINDOW_MS
    }
}

fn format_last_updated(epoch_ms: i64) -> Option<String> {
    Local
        .timestamp_millis_opt(epoch_ms)
        .single()
        .map(|ts| ts.format(LAST_UPDATED_FORMAT).to_string())
}

/// Current wall clock in epoch millis.
pub fn epoch_ms_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn arm_state_decodes_known_codes() {
        assert_eq!(ArmState::from_code(0.0), Some(ArmState::Disarmed));
        assert_eq!(ArmState::from_code(1.0), Some(ArmState::Armed));
        assert_eq!(ArmState::from_code(2.0), Some(ArmState::Triggered));
    }

    #[test]
    fn arm_state_rejects_unknown_codes() {
        assert_eq!(ArmState::from_code(3.0), None);
        assert_eq!(ArmState::from_code(1.5), None);
        assert_eq!(ArmState::from_code(-1.0), None);
    }

    #[test]
    fn sensor_state_decodes_known_codes() {
        assert_eq!(SensorState::from_code(0.0), Some(SensorState::Clear));
        assert_eq!(SensorState::from_code(1.0), Some(SensorState::PirTriggered));
        assert_eq!(SensorState::from_code(2.0), Some(SensorState::MagnetTriggered));
        assert_eq!(SensorState::from_code(3.0), Some(SensorState::Offline));
        assert_eq!(SensorState::from_code(4.0), None);
    }

    #[test]
    fn codes_round_trip() {
        for state in [ArmState::Disarmed, ArmState::Armed, ArmState::Triggered] {
            assert_eq!(ArmState::from_code(state.code()), Some(state));
        }
        for method in [ArmMethod::None, ArmMethod::Stay, ArmMethod::Away] {
            assert_eq!(ArmMethod::from_code(method.code()), Some(method));
        }
    }

    #[test]
    fn apply_sets_derived_flags() {
        let mut status = PanelStatus::default();
        status.apply(1.0, 2.0, 0.0, 1_700_000_000_000);

        assert!(!status.is_disarmed());
        assert!(!status.is_alarm_triggered());
        assert!(status.is_arm_away());
        assert!(!status.is_arm_stay());
        assert_eq!(status.last_activity_ms(), 1_700_000_000_000);
        assert!(status.last_updated().is_some());
    }

    #[test]
    fn state_changed_set_on_disarm_flip() {
        let mut status = PanelStatus::default();
        status.apply(0.0, 0.0, 0.0, 0);
        assert!(status.state_changed(), "None -> Disarmed is a flip");
        status.clear_state_changed();

        // Disarmed -> Armed (away): the scenario from a poll after arming.
        status.apply(1.0, 2.0, 0.0, 0);
        assert!(status.state_changed());
        assert!(status.is_arm_away());
    }

    #[test]
    fn state_changed_is_sticky_across_refreshes() {
        let mut status = PanelStatus::default();
        status.apply(0.0, 0.0, 0.0, 0);
        status.clear_state_changed();

        status.apply(1.0, 1.0, 0.0, 0);
        assert!(status.state_changed());

        // Further refreshes with no flip must not clear the flag.
        status.apply(1.0, 1.0, 0.0, 0);
        status.apply(1.0, 1.0, 0.0, 0);
        assert!(status.state_changed());

        status.clear_state_changed();
        assert!(!status.state_changed());
    }

    #[test]
    fn state_changed_not_set_without_flip() {
        let mut status = PanelStatus::default();
        status.apply(1.0, 2.0, 0.0, 0);
        // None -> Armed: is_disarmed stays false, no edge.
        assert!(!status.state_changed());
    }

    #[test]
    fn liveness_window_boundary() {
        let mut status = PanelStatus::default();
        status.apply(0.0, 0.0, 0.0, 1_000_000);

        assert!(status.is_online(1_000_000 + LIVENESS_WINDOW_MS - 1));
        assert!(!status.is_online(1_000_000 + LIVENESS_WINDOW_MS));
    }

    #[test]
    fn unrecognized_codes_clear_derived_flags() {
        let mut status = PanelStatus::default();
        status.apply(9.0, 9.0, 9.0, 0);

        assert!(!status.is_disarmed());
        assert!(!status.is_alarm_triggered());
        assert!(!status.is_arm_away());
        assert_eq!(status.sensor(), None);
    }
}
