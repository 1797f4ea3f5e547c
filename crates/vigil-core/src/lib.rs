//! Panel state model and background synchronization.
//!
//! This crate layers the domain logic on top of [`vigil_api`]: decoding the
//! panel's numeric variable codes into typed state ([`status`]), a command
//! façade that serializes writes against the poll loop ([`panel`]), the
//! polling watchdog that classifies each cycle into user-facing
//! notifications ([`watchdog`]), and the bounded digest of those
//! notifications ([`inbox`]).

pub mod inbox;
pub mod panel;
pub mod status;
pub mod watchdog;

pub use inbox::{INBOX_CAPACITY, NotificationInbox};
pub use panel::{Dispatch, Panel, labels};
pub use status::{
    ArmMethod, ArmState, LIVENESS_WINDOW_MS, PanelStatus, SensorState, epoch_ms_now,
};
pub use vigil_api::Error;
pub use watchdog::{AlarmReason, DEFAULT_POLL_INTERVAL, Notification, Watchdog};
