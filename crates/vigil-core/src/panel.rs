// Command facade over the variable-store client.
//
// The `Panel` owns the single shared `PanelStatus` and is the only code
// that mutates it. Every state-mutating operation -- refresh or command --
// passes through one test-and-set guard, so the poll loop and user-issued
// commands can never interleave partial updates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::debug;

use vigil_api::{Error, PanelClient};

use crate::status::{ArmMethod, ArmState, PanelStatus, SensorState};

/// The remote variable slots the panel is synchronized against.
pub mod labels {
    pub const STATE: &str = "state";
    pub const METHOD: &str = "method";
    pub const SENSOR: &str = "sensor";
}

/// How a facade call was handled.
///
/// Calls arriving while another operation holds the in-flight guard are
/// dropped silently -- not queued, not an error -- and report [`Busy`].
///
/// [`Busy`]: Dispatch::Busy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Done,
    Busy,
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. Constructed once at startup and handed to
/// both the watchdog and the presentation layer; there is no hidden global
/// instance. Status snapshots are published through a `watch` channel so
/// consumers can either poll [`status`](Self::status) or subscribe.
#[derive(Clone)]
pub struct Panel {
    inner: Arc<PanelInner>,
}

struct PanelInner {
    client: PanelClient,
    status: watch::Sender<PanelStatus>,
    in_flight: AtomicBool,
}

/// RAII release for the in-flight guard.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Panel {
    pub fn new(client: PanelClient) -> Self {
        let (status, _) = watch::channel(PanelStatus::default());
        Self {
            inner: Arc::new(PanelInner {
                client,
                status,
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    // ── State observation ────────────────────────────────────────────

    /// The current status snapshot.
    pub fn status(&self) -> PanelStatus {
        self.inner.status.borrow().clone()
    }

    /// Subscribe to status snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<PanelStatus> {
        self.inner.status.subscribe()
    }

    /// Consume the one-shot change edge after acting on it.
    pub fn clear_state_changed(&self) {
        self.inner.status.send_modify(PanelStatus::clear_state_changed);
    }

    // ── Facade operations ────────────────────────────────────────────

    /// Fetch the three panel variables and apply them as one snapshot.
    pub async fn refresh(&self) -> Result<Dispatch, Error> {
        let Some(_guard) = self.try_acquire() else {
            debug!("refresh dropped -- another operation is in flight");
            return Ok(Dispatch::Busy);
        };
        self.refresh_locked().await?;
        Ok(Dispatch::Done)
    }

    pub async fn arm_away(&self) -> Result<Dispatch, Error> {
        self.command(ArmState::Armed, ArmMethod::Away).await
    }

    pub async fn arm_stay(&self) -> Result<Dispatch, Error> {
        self.command(ArmState::Armed, ArmMethod::Stay).await
    }

    pub async fn disarm(&self) -> Result<Dispatch, Error> {
        self.command(ArmState::Disarmed, ArmMethod::None).await
    }

    // ── Internals ────────────────────────────────────────────────────

    fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.inner
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_ok()
            .then(|| FlightGuard(&self.inner.in_flight))
    }

    /// Refresh with the guard already held.
    ///
    /// The three fetches run sequentially: one outstanding request at a
    /// time keeps the auth-retry bookkeeping simple. The first failure
    /// aborts without touching the stored snapshot.
    async fn refresh_locked(&self) -> Result<(), Error> {
        let state = self.inner.client.get_value(labels::STATE).await?;
        let method = self.inner.client.get_value(labels::METHOD).await?;
        let sensor = self.inner.client.get_value(labels::SENSOR).await?;

        self.inner.status.send_modify(|s| {
            s.apply(
                state.last_value.value,
                method.last_value.value,
                sensor.last_value.value,
                state.last_activity,
            );
        });
        debug!("panel snapshot refreshed");
        Ok(())
    }

    async fn command(&self, state: ArmState, method: ArmMethod) -> Result<Dispatch, Error> {
        let Some(_guard) = self.try_acquire() else {
            debug!(?state, ?method, "command dropped -- another operation is in flight");
            return Ok(Dispatch::Busy);
        };
        self.change_values(state, method, SensorState::Clear).await?;
        self.refresh_locked().await?;
        Ok(Dispatch::Done)
    }

    /// Write the three variables in a fixed order: method, state, sensor.
    ///
    /// The device arms on the `state` write, so the away/stay method must
    /// already be visible when state flips. The `sensor` write only resets
    /// the slot. A failed write aborts the sequence immediately; earlier
    /// writes are not rolled back -- the device reconciles on the next
    /// full refresh.
    async fn change_values(
        &self,
        state: ArmState,
        method: ArmMethod,
        sensor: SensorState,
    ) -> Result<(), Error> {
        self.inner
            .client
            .send_value(labels::METHOD, method.code())
            .await?;
        self.inner
            .client
            .send_value(labels::STATE, state.code())
            .await?;
        self.inner
            .client
            .send_value(labels::SENSOR, sensor.code())
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("in_flight", &self.inner.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
