use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TargetDurationError {
    #[error("unsupported target duration: {0} minutes (expected 15, 25, 45 or 60)")]
    UnsupportedMinutes(u32),
}

//
// ─── TARGET DURATION ──────────────────────────────────────────────────────────
//

/// Session target presets offered to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetDuration {
    Minutes15,
    #[default]
    Minutes25,
    Minutes45,
    Minutes60,
}

impl TargetDuration {
    pub const ALL: [TargetDuration; 4] = [
        TargetDuration::Minutes15,
        TargetDuration::Minutes25,
        TargetDuration::Minutes45,
        TargetDuration::Minutes60,
    ];

    /// Maps a preset in minutes to a `TargetDuration`.
    ///
    /// # Errors
    ///
    /// Returns `TargetDurationError::UnsupportedMinutes` for anything other
    /// than 15, 25, 45 or 60.
    pub fn from_minutes(minutes: u32) -> Result<Self, TargetDurationError> {
        match minutes {
            15 => Ok(Self::Minutes15),
            25 => Ok(Self::Minutes25),
            45 => Ok(Self::Minutes45),
            60 => Ok(Self::Minutes60),
            other => Err(TargetDurationError::UnsupportedMinutes(other)),
        }
    }

    /// Maps a persisted seconds value back to a preset, if it is one.
    #[must_use]
    pub fn from_seconds(seconds: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.seconds() == seconds)
    }

    #[must_use]
    pub fn minutes(self) -> u32 {
        match self {
            Self::Minutes15 => 15,
            Self::Minutes25 => 25,
            Self::Minutes45 => 45,
            Self::Minutes60 => 60,
        }
    }

    #[must_use]
    pub fn seconds(self) -> u64 {
        u64::from(self.minutes()) * 60
    }
}

//
// ─── TIMER STATE ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerPhase {
    #[default]
    Stopped,
    Running,
}

/// Dual-counter practice timer.
///
/// `session_secs` and `total_secs` only move together through [`TimerState::tick`],
/// and ticks are ignored unless the timer is running.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimerState {
    total_secs: u64,
    session_secs: u64,
    target: TargetDuration,
    phase: TimerPhase,
}

impl TimerState {
    /// Rehydrate persisted counters. The session counter always starts at zero.
    #[must_use]
    pub fn from_persisted(total_secs: u64, target: TargetDuration) -> Self {
        Self {
            total_secs,
            session_secs: 0,
            target,
            phase: TimerPhase::Stopped,
        }
    }

    /// Stopped -> Running. Returns false if the timer was already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.phase = TimerPhase::Running;
        true
    }

    /// Running -> Stopped. Returns false if the timer was already stopped.
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.phase = TimerPhase::Stopped;
        true
    }

    /// Stop and zero the session counter. The lifetime total is untouched.
    pub fn reset(&mut self) {
        self.phase = TimerPhase::Stopped;
        self.session_secs = 0;
    }

    /// Advance both counters by one second. Returns false (and changes nothing)
    /// while stopped.
    pub fn tick(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.session_secs = self.session_secs.saturating_add(1);
        self.total_secs = self.total_secs.saturating_add(1);
        true
    }

    pub fn set_target(&mut self, target: TargetDuration) {
        self.target = target;
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        self.target.seconds().saturating_sub(self.session_secs)
    }

    /// The countdown reached zero during an actual session.
    #[must_use]
    pub fn is_time_up(&self) -> bool {
        self.remaining_secs() == 0 && self.session_secs > 0
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    #[must_use]
    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    #[must_use]
    pub fn total_secs(&self) -> u64 {
        self.total_secs
    }

    #[must_use]
    pub fn session_secs(&self) -> u64 {
        self.session_secs
    }

    #[must_use]
    pub fn target(&self) -> TargetDuration {
        self.target
    }
}
