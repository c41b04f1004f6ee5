//! Periodic stat decay.
//!
//! One tokio task per stat, each ticking at its variant's period. All four share a
//! single cancellation token, a child of the session token, so ending the session or
//! exhausting the pet stops every timer at once. Each tick takes the sink's lock and
//! re-checks the token under it, so once [`DecayScheduler::stop`] returns no tick can
//! touch the pet again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::model::{DecayIntervals, StatKind};

const MIN_PERIOD: Duration = Duration::from_millis(1);
/// Longest decay period a timer accepts; keeps `Instant + period` in range.
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub type Hook = Arc<dyn Fn() + Send + Sync>;

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State the decay timers act on.
pub trait DecaySink: Send + 'static {
    /// Applies one unit of decay to `stat`. Returns true only on the tick that ended
    /// the game.
    fn decay(&mut self, stat: StatKind) -> bool;
}

/// Delivers the game-over notice after a short grace delay, unless the session ends
/// first.
#[derive(Clone)]
pub struct GameOverSignal {
    grace: Duration,
    session: CancellationToken,
    notify: Option<Hook>,
}

impl GameOverSignal {
    pub fn new(grace: Duration, session: CancellationToken, notify: Option<Hook>) -> Self {
        Self {
            grace,
            session,
            notify,
        }
    }

    pub fn raise(&self) {
        info!(grace_ms = self.grace.as_millis() as u64, "game over");
        let Some(notify) = self.notify.clone() else {
            return;
        };
        let grace = self.grace;
        let session = self.session.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = session.cancelled() => debug!("session ended before game-over notice"),
                _ = time::sleep(grace) => notify(),
            }
        });
    }
}

pub struct DecayScheduler<S: DecaySink> {
    sink: Arc<Mutex<S>>,
    ticks: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl<S: DecaySink> DecayScheduler<S> {
    /// Spawns the four decay timers. Must be called inside a tokio runtime.
    pub fn start(
        sink: Arc<Mutex<S>>,
        intervals: DecayIntervals,
        session: &CancellationToken,
        signal: GameOverSignal,
    ) -> Self {
        let ticks = session.child_token();
        let handles = StatKind::ALL
            .into_iter()
            .map(|stat| {
                tokio::spawn(decay_loop(
                    sink.clone(),
                    stat,
                    intervals.period(stat).clamp(MIN_PERIOD, MAX_PERIOD),
                    ticks.clone(),
                    signal.clone(),
                ))
            })
            .collect();
        info!(
            hunger_s = intervals.hunger.as_secs_f64(),
            fun_s = intervals.fun.as_secs_f64(),
            grooming_s = intervals.grooming.as_secs_f64(),
            sleep_s = intervals.sleep.as_secs_f64(),
            "decay timers started"
        );
        Self {
            sink,
            ticks,
            handles,
        }
    }

    /// Cancels all four timers. Idempotent. Must not be called while holding the
    /// sink's lock.
    pub fn stop(&self) {
        let _guard = lock(&self.sink);
        if !self.ticks.is_cancelled() {
            self.ticks.cancel();
            debug!("decay timers stopped");
        }
    }

    /// Cancelled once the timers stop, whether by game over, [`stop`](Self::stop) or the
    /// session ending.
    pub fn stopped(&self) -> CancellationToken {
        self.ticks.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.ticks.is_cancelled() && self.handles.iter().any(|h| !h.is_finished())
    }
}

impl<S: DecaySink> Drop for DecayScheduler<S> {
    fn drop(&mut self) {
        self.ticks.cancel();
    }
}

async fn decay_loop<S: DecaySink>(
    sink: Arc<Mutex<S>>,
    stat: StatKind,
    period: Duration,
    ticks: CancellationToken,
    signal: GameOverSignal,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = ticks.cancelled() => break,
            _ = interval.tick() => {}
        }
        let ended = {
            let mut state = lock(&sink);
            if ticks.is_cancelled() {
                break;
            }
            let ended = state.decay(stat);
            if ended {
                ticks.cancel();
            }
            ended
        };
        debug!(stat = %stat, "decay tick");
        if ended {
            signal.raise();
            break;
        }
    }
}
