//! Notify/wait rendezvous between the simulation and the presentation layer.
//!
//! The machine takes a [`CompletionToken`] with [`Gate::wait`], broadcasts the event
//! with [`Gate::emit`] and then refuses to advance until [`Gate::poll`] reports the
//! token as completed. Listeners run synchronously in registration order; the first
//! one that takes the token out of the slot owns it.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::CombatError;
use crate::event::CombatEvent;

const PENDING: u8 = 0;
const COMPLETED: u8 = 1;
const ABANDONED: u8 = 2;

/// Single-use completion signal. Consumed by [`CompletionToken::complete`]; dropping
/// it unused abandons the wait.
#[derive(Debug)]
pub struct CompletionToken {
    signal: Arc<AtomicU8>,
    event: &'static str,
    spent: bool,
}

impl CompletionToken {
    pub fn event(&self) -> &'static str {
        self.event
    }

    pub fn complete(mut self) {
        self.spent = true;
        self.signal.store(COMPLETED, Ordering::Release);
        trace!(target: "combat.gate", event = self.event, "completion token invoked");
    }

    /// Splits the token so several presentation effects can gate the same event.
    /// The token completes when the last part does.
    pub fn split(self, parts: usize) -> Vec<CompletionPart> {
        if parts == 0 {
            self.complete();
            return Vec::new();
        }
        let join = Arc::new(Join {
            remaining: AtomicUsize::new(parts),
            token: Mutex::new(Some(self)),
        });
        (0..parts)
            .map(|_| CompletionPart {
                join: Arc::clone(&join),
            })
            .collect()
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if self.spent {
            return;
        }
        if self
            .signal
            .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            warn!(
                target: "combat.gate",
                event = self.event,
                "completion token dropped without being invoked"
            );
        }
    }
}

#[derive(Debug)]
struct Join {
    remaining: AtomicUsize,
    token: Mutex<Option<CompletionToken>>,
}

/// One share of a split [`CompletionToken`].
#[derive(Debug)]
pub struct CompletionPart {
    join: Arc<Join>,
}

impl CompletionPart {
    pub fn complete(self) {
        if self.join.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        if let Ok(mut slot) = self.join.token.lock() {
            if let Some(token) = slot.take() {
                token.complete();
            }
        }
    }
}

/// Receives every emitted event. Take the token out of `done` to own the completion;
/// leave it for a later listener otherwise.
pub trait Listener: Send + Sync {
    fn notify(&mut self, event: &CombatEvent, done: &mut Option<CompletionToken>);
}

impl<F> Listener for F
where
    F: FnMut(&CombatEvent, &mut Option<CompletionToken>) + Send + Sync,
{
    fn notify(&mut self, event: &CombatEvent, done: &mut Option<CompletionToken>) {
        self(event, done)
    }
}

/// Listener that acknowledges everything on the spot. Used by headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoAck;

impl Listener for AutoAck {
    fn notify(&mut self, _event: &CombatEvent, done: &mut Option<CompletionToken>) {
        if let Some(token) = done.take() {
            token.complete();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitStatus {
    Idle,
    Pending(&'static str),
    Completed(&'static str),
}

#[derive(Debug)]
struct PendingWait {
    signal: Arc<AtomicU8>,
    event: &'static str,
    since: Instant,
    warned: bool,
}

#[derive(Default)]
pub struct Gate {
    listeners: Vec<Box<dyn Listener>>,
    pending: Option<PendingWait>,
    stall_warning: Option<Duration>,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("listeners", &self.listeners.len())
            .field("pending", &self.pending)
            .field("stall_warning", &self.stall_warning)
            .finish()
    }
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs a warning once a wait has been pending longer than `after`. Never
    /// advances on its own.
    pub fn set_stall_warning(&mut self, after: Option<Duration>) {
        self.stall_warning = after;
    }

    pub fn listen(&mut self, listener: impl Listener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Opens a wait for `event` and returns its token. Only one wait may be open.
    pub fn wait(&mut self, event: &'static str) -> Result<CompletionToken, CombatError> {
        if let Some(pending) = &self.pending {
            return Err(CombatError::state(format!(
                "gate is still waiting on `{}`",
                pending.event
            )));
        }
        let signal = Arc::new(AtomicU8::new(PENDING));
        self.pending = Some(PendingWait {
            signal: Arc::clone(&signal),
            event,
            since: Instant::now(),
            warned: false,
        });
        Ok(CompletionToken {
            signal,
            event,
            spent: false,
        })
    }

    /// Broadcasts `event` to every listener in registration order.
    pub fn emit(&mut self, event: &CombatEvent, token: CompletionToken) {
        debug!(target: "combat.gate", event = event.name(), listeners = self.listeners.len(), "emit");
        let mut slot = Some(token);
        for listener in &mut self.listeners {
            listener.notify(event, &mut slot);
        }
        if slot.is_some() {
            warn!(
                target: "combat.gate",
                event = event.name(),
                "no listener claimed the completion token"
            );
        }
    }

    /// Checks the open wait. A completed wait is closed; an abandoned one stays open
    /// and keeps reporting [`CombatError::StalledWait`].
    pub fn poll(&mut self) -> Result<WaitStatus, CombatError> {
        let Some(pending) = self.pending.as_mut() else {
            return Ok(WaitStatus::Idle);
        };
        match pending.signal.load(Ordering::Acquire) {
            COMPLETED => {
                let event = pending.event;
                self.pending = None;
                Ok(WaitStatus::Completed(event))
            }
            ABANDONED => Err(CombatError::StalledWait {
                event: pending.event,
            }),
            _ => {
                if let Some(limit) = self.stall_warning {
                    let waited = pending.since.elapsed();
                    if waited > limit && !pending.warned {
                        pending.warned = true;
                        warn!(
                            target: "combat.gate",
                            event = pending.event,
                            waited_ms = waited.as_millis() as u64,
                            "still waiting for presentation to complete"
                        );
                    }
                }
                Ok(WaitStatus::Pending(pending.event))
            }
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Drops any open wait. Used when an encounter is torn down.
    pub fn reset(&mut self) {
        self.pending = None;
    }
}
