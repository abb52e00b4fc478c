//! Readiness Gate
//!
//! One-shot synchronization between setup and the public store operations.
//! Setup runs at most once, guarded by [`SetupState`]; its outcome is
//! published through [`ReadinessGate`], which every operation awaits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::watch;

use crate::error::{Result, StoreError};

/// Resolution state of the gate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateState {
    Pending,
    Ready,
    Failed(String),
}

/// Awaitable value that resolves exactly once
#[derive(Clone, Debug)]
pub struct ReadinessGate {
    tx: Arc<watch::Sender<GateState>>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(GateState::Pending);
        Self { tx: Arc::new(tx) }
    }

    /// Resolve the gate. Later calls are ignored and return `false`.
    pub fn resolve(&self, outcome: GateState) -> bool {
        if outcome == GateState::Pending {
            return false;
        }
        self.tx.send_if_modified(|state| {
            if *state == GateState::Pending {
                *state = outcome;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the gate resolves
    pub async fn wait(&self) -> Result<()> {
        let mut rx = self.tx.subscribe();
        let state = rx
            .wait_for(|state| *state != GateState::Pending)
            .await
            .map_err(|_| StoreError::SetupFailed("readiness gate closed".into()))?;

        match &*state {
            GateState::Failed(reason) => Err(StoreError::SetupFailed(reason.clone())),
            _ => Ok(()),
        }
    }

    pub fn state(&self) -> GateState {
        self.tx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow() == GateState::Ready
    }
}

/// Phase of the one-time setup routine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupPhase {
    NotStarted,
    Started,
    Done,
}

const NOT_STARTED: u8 = 0;
const STARTED: u8 = 1;
const DONE: u8 = 2;

/// Atomic not-started/started/done tag guarding setup
#[derive(Debug, Default)]
pub struct SetupState(AtomicU8);

impl SetupState {
    pub const fn new() -> Self {
        Self(AtomicU8::new(NOT_STARTED))
    }

    /// Claim the setup run. Only the first caller gets `true`.
    pub fn try_start(&self) -> bool {
        self.0
            .compare_exchange(NOT_STARTED, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn finish(&self) {
        self.0.store(DONE, Ordering::Release);
    }

    pub fn phase(&self) -> SetupPhase {
        match self.0.load(Ordering::Acquire) {
            NOT_STARTED => SetupPhase::NotStarted,
            STARTED => SetupPhase::Started,
            _ => SetupPhase::Done,
        }
    }
}
