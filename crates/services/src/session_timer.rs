use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use drill_core::model::{TargetDuration, TimerState};
use storage::repository::KeyValueStore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::persist::{PersistQueue, keys};

const TICK_PERIOD: Duration = Duration::from_secs(1);

struct Shared {
    state: TimerState,
    // Bumped whenever the ticker is armed or disarmed; a ticker only counts
    // while its epoch is current.
    epoch: u64,
}

/// Practice timer with a lifetime total, a resettable session counter and a
/// target countdown.
///
/// At most one tick task is alive at a time. Counters are tick-counted: if the
/// runtime delays ticks, elapsed time under-counts wall time.
pub struct SessionTimer {
    shared: Arc<Mutex<Shared>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    persist: PersistQueue,
}

impl SessionTimer {
    /// Load the persisted total and target from `store`.
    ///
    /// Missing or malformed values fall back to a zero total and a 25 minute
    /// target.
    pub async fn load(store: &dyn KeyValueStore, persist: PersistQueue) -> Self {
        let total = read_total(store).await;
        let target = read_target(store).await;
        tracing::debug!(total, target_secs = target.seconds(), "session timer loaded");
        Self::from_state(TimerState::from_persisted(total, target), persist)
    }

    fn from_state(state: TimerState, persist: PersistQueue) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared { state, epoch: 0 })),
            ticker: Mutex::new(None),
            persist,
        }
    }

    /// Start counting. No-op while already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let epoch = {
            let mut shared = self.lock_shared();
            if !shared.state.start() {
                return;
            }
            shared.epoch += 1;
            shared.epoch
        };
        tracing::debug!("session timer started");
        self.arm_ticker(epoch);
    }

    /// Stop counting; counters keep their values.
    pub fn pause(&self) {
        {
            let mut shared = self.lock_shared();
            if !shared.state.pause() {
                return;
            }
            shared.epoch += 1;
        }
        tracing::debug!("session timer paused");
        self.disarm_ticker();
    }

    /// Stop and zero the session counter. The lifetime total is untouched.
    pub fn reset(&self) {
        {
            let mut shared = self.lock_shared();
            shared.state.reset();
            shared.epoch += 1;
        }
        tracing::debug!("session timer reset");
        self.disarm_ticker();
    }

    /// Change the countdown target and persist it. Allowed in any state.
    pub fn set_target_duration(&self, target: TargetDuration) {
        self.lock_shared().state.set_target(target);
        self.persist
            .write(keys::TARGET_DURATION_SECONDS, target.seconds().to_string());
    }

    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.lock_shared().state.remaining_secs()
    }

    #[must_use]
    pub fn is_time_up(&self) -> bool {
        self.lock_shared().state.is_time_up()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock_shared().state.is_running()
    }

    #[must_use]
    pub fn total_elapsed_seconds(&self) -> u64 {
        self.lock_shared().state.total_secs()
    }

    #[must_use]
    pub fn session_elapsed_seconds(&self) -> u64 {
        self.lock_shared().state.session_secs()
    }

    #[must_use]
    pub fn target(&self) -> TargetDuration {
        self.lock_shared().state.target()
    }

    fn arm_ticker(&self, epoch: u64) {
        let mut slot = self.lock_ticker();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let shared = Arc::clone(&self.shared);
        let persist = self.persist.clone();
        *slot = Some(tokio::spawn(run_ticker(shared, persist, epoch)));
    }

    fn disarm_ticker(&self) {
        if let Some(handle) = self.lock_ticker().take() {
            handle.abort();
        }
    }

    fn lock_shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_ticker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.disarm_ticker();
    }
}

async fn run_ticker(shared: Arc<Mutex<Shared>>, persist: PersistQueue, epoch: u64) {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let total = {
            let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.epoch != epoch || !guard.state.tick() {
                break;
            }
            guard.state.total_secs()
        };
        persist.write(keys::TOTAL_ELAPSED_SECONDS, total.to_string());
    }
}

async fn read_total(store: &dyn KeyValueStore) -> u64 {
    match store.get(keys::TOTAL_ELAPSED_SECONDS).await {
        Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, "total elapsed seconds is malformed; using 0");
            0
        }),
        Ok(None) => 0,
        Err(err) => {
            tracing::warn!(error = %err, "could not read total elapsed seconds; using 0");
            0
        }
    }
}

async fn read_target(store: &dyn KeyValueStore) -> TargetDuration {
    let raw = match store.get(keys::TARGET_DURATION_SECONDS).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return TargetDuration::default(),
        Err(err) => {
            tracing::warn!(error = %err, "could not read target duration; using default");
            return TargetDuration::default();
        }
    };
    let parsed = raw
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(TargetDuration::from_seconds);
    parsed.unwrap_or_else(|| {
        tracing::warn!(value = %raw, "target duration is not a preset; using default");
        TargetDuration::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryStore;

    async fn timer_over(store: &InMemoryStore) -> (SessionTimer, PersistQueue) {
        let persist = PersistQueue::spawn(Arc::new(store.clone()));
        let timer = SessionTimer::load(store, persist.clone()).await;
        (timer, persist)
    }

    #[tokio::test]
    async fn defaults_when_store_is_empty() {
        let store = InMemoryStore::new();
        let (timer, _) = timer_over(&store).await;
        assert_eq!(timer.total_elapsed_seconds(), 0);
        assert_eq!(timer.session_elapsed_seconds(), 0);
        assert_eq!(timer.target(), TargetDuration::Minutes25);
        assert_eq!(timer.remaining(), 1500);
        assert!(!timer.is_running());
    }

    #[tokio::test]
    async fn malformed_values_fall_back_to_defaults() {
        let store = InMemoryStore::new();
        store.set(keys::TOTAL_ELAPSED_SECONDS, "abc").await.unwrap();
        store.set(keys::TARGET_DURATION_SECONDS, "1000").await.unwrap();
        let (timer, _) = timer_over(&store).await;
        assert_eq!(timer.total_elapsed_seconds(), 0);
        assert_eq!(timer.target(), TargetDuration::Minutes25);
    }

    #[tokio::test]
    async fn persisted_values_are_restored() {
        let store = InMemoryStore::new();
        store.set(keys::TOTAL_ELAPSED_SECONDS, "321").await.unwrap();
        store.set(keys::TARGET_DURATION_SECONDS, "2700").await.unwrap();
        let (timer, _) = timer_over(&store).await;
        assert_eq!(timer.total_elapsed_seconds(), 321);
        assert_eq!(timer.target(), TargetDuration::Minutes45);
    }

    #[tokio::test(start_paused = true)]
    async fn five_ticks_then_pause() {
        let store = InMemoryStore::new();
        store.set(keys::TOTAL_ELAPSED_SECONDS, "100").await.unwrap();
        let (timer, persist) = timer_over(&store).await;

        timer.start();
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        timer.pause();

        assert_eq!(timer.session_elapsed_seconds(), 5);
        assert_eq!(timer.total_elapsed_seconds(), 105);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(timer.session_elapsed_seconds(), 5);

        persist.flush().await;
        assert_eq!(
            store.get(keys::TOTAL_ELAPSED_SECONDS).await.unwrap().as_deref(),
            Some("105")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_keeps_a_single_tick_source() {
        let store = InMemoryStore::new();
        let (timer, _) = timer_over(&store).await;

        timer.start();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        timer.start();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(timer.session_elapsed_seconds(), 3);
        assert_eq!(timer.total_elapsed_seconds(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_then_resume_does_not_double_count() {
        let store = InMemoryStore::new();
        let (timer, _) = timer_over(&store).await;

        for _ in 0..4 {
            timer.start();
            tokio::time::sleep(Duration::from_millis(1_200)).await;
            timer.pause();
            timer.start();
            timer.pause();
        }

        assert_eq!(timer.session_elapsed_seconds(), 4);
        assert_eq!(timer.total_elapsed_seconds(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_zeroes_session_only() {
        let store = InMemoryStore::new();
        let (timer, _) = timer_over(&store).await;

        timer.start();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let total_before = timer.total_elapsed_seconds();
        timer.reset();

        assert!(!timer.is_running());
        assert_eq!(timer.session_elapsed_seconds(), 0);
        assert_eq!(timer.total_elapsed_seconds(), total_before);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(timer.total_elapsed_seconds(), total_before);
    }

    #[tokio::test]
    async fn target_is_persisted_in_any_state() {
        let store = InMemoryStore::new();
        let (timer, persist) = timer_over(&store).await;

        timer.start();
        timer.set_target_duration(TargetDuration::Minutes15);
        assert!(timer.is_running());
        assert_eq!(timer.remaining(), 900);
        timer.pause();

        persist.flush().await;
        assert_eq!(
            store.get(keys::TARGET_DURATION_SECONDS).await.unwrap().as_deref(),
            Some("900")
        );
    }
}
