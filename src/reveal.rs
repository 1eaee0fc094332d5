//! Progressive reveal of an already-complete reply
//!
//! The backend answers in one piece; the scheduler replays that answer one
//! character per tick so it reads as if it were arriving. A reveal can be
//! frozen at any point with [`RevealHandle::stop`]: once `stop` returns, no
//! further callback runs for that reveal.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default per-character delay
pub const DEFAULT_TICK: Duration = Duration::from_micros(3200);

/// Starts reveals at a fixed per-character rate
#[derive(Debug, Clone, Copy)]
pub struct RevealScheduler {
    tick: Duration,
}

impl Default for RevealScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

impl RevealScheduler {
    /// A zero tick is raised to one microsecond.
    pub fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_micros(1)),
        }
    }

    /// Reveal `full_text`, calling `on_partial` with the growing prefix once
    /// per tick and `on_complete` once the whole text has been emitted.
    ///
    /// Empty text completes before this returns, with no partial calls.
    /// Callbacks run while the reveal's gate is held and must not call back
    /// into the returned handle. Must be called within a Tokio runtime.
    pub fn start<P, C>(&self, full_text: String, mut on_partial: P, on_complete: C) -> RevealHandle
    where
        P: FnMut(&str) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let gate = Arc::new(Mutex::new(GateState::Running));
        let token = CancellationToken::new();

        if full_text.is_empty() {
            *lock(&gate) = GateState::Completed;
            on_complete();
            return RevealHandle {
                gate,
                token,
                task: None,
            };
        }

        let tick = self.tick;
        let task_gate = Arc::clone(&gate);
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            // Deadlines are absolute, so timer granularity never slows the
            // overall rate; late ticks are caught up in a burst
            let mut ticks = interval_at(Instant::now() + tick, tick);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);

            let mut revealed = String::with_capacity(full_text.len());
            for ch in full_text.chars() {
                tokio::select! {
                    biased;

                    () = task_token.cancelled() => return,

                    _ = ticks.tick() => {}
                }

                revealed.push(ch);
                let gate = lock(&task_gate);
                if *gate != GateState::Running {
                    return;
                }
                on_partial(&revealed);
            }

            let mut gate = lock(&task_gate);
            if *gate == GateState::Running {
                *gate = GateState::Completed;
                on_complete();
            }
        });

        RevealHandle {
            gate,
            token,
            task: Some(task),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Running,
    Stopped,
    Completed,
}

fn lock(gate: &Mutex<GateState>) -> MutexGuard<'_, GateState> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Control over one running reveal; dropping it stops the reveal
#[derive(Debug)]
pub struct RevealHandle {
    gate: Arc<Mutex<GateState>>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RevealHandle {
    /// Freeze the reveal at its current prefix.
    ///
    /// Returns `false` if the reveal had already completed or been stopped.
    pub fn stop(&self) -> bool {
        {
            let mut gate = lock(&self.gate);
            if *gate != GateState::Running {
                return false;
            }
            *gate = GateState::Stopped;
        }
        self.token.cancel();
        true
    }

    /// Completed or stopped
    pub fn is_finished(&self) -> bool {
        *lock(&self.gate) != GateState::Running
    }

    #[cfg(test)]
    pub fn is_stopped(&self) -> bool {
        *lock(&self.gate) == GateState::Stopped
    }
}

impl Drop for RevealHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
