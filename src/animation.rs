//! Cooperative state machine that breaks one FRACTRAN transition into observable phases.
//!
//! The controller never computes a transition itself: every state it publishes comes
//! from [`machine::step`]. Time is driven by the host, which calls
//! [`AnimationController::advance_clock`] with elapsed time and then
//! [`AnimationController::poll`] until it returns `None`. Each phase suspends on a
//! single pending timer keyed by that phase; [`AnimationController::stop`] cancels it.
//!
//! ```text
//! idle --> scanning --> selecting --> consuming --> producing --> idle
//!   \          \
//!    \          `--> halt (no rule matched)
//!     `--> step / halt directly when speed is above the instant threshold
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::machine::{self, first_applicable};
use crate::types::{
    MachineState, Program, DEFAULT_SPEED, INSTANT_SPEED_THRESHOLD, MAX_SPEED, MIN_SPEED,
};

/// The phase of the current animated transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationPhase {
    #[default]
    Idle,
    /// Walking the rule list one index per tick.
    Scanning,
    /// Dwelling on the chosen rule.
    Selecting,
    /// Showing the denominator being removed.
    Consuming,
    /// Showing the numerator being added; publishes the new state on completion.
    Producing,
}

impl fmt::Display for AnimationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnimationPhase::Idle => "idle",
            AnimationPhase::Scanning => "scanning",
            AnimationPhase::Selecting => "selecting",
            AnimationPhase::Consuming => "consuming",
            AnimationPhase::Producing => "producing",
        };
        write!(f, "{name}")
    }
}

/// Returns how long `phase` waits before firing at `speed`.
///
/// Higher speeds give shorter delays, each with a floor. In instant mode only the idle
/// delay is used.
pub fn phase_delay(phase: AnimationPhase, speed: u32, instant: bool) -> Duration {
    let speed = i64::from(speed);
    let millis = match phase {
        AnimationPhase::Idle if instant => (200 - speed * 2).max(10),
        AnimationPhase::Idle => 50,
        AnimationPhase::Scanning => (150 - speed).max(20),
        AnimationPhase::Selecting => (400 - speed * 3).max(50),
        AnimationPhase::Consuming | AnimationPhase::Producing => (500 - speed * 4).max(50),
    };

    Duration::from_millis(millis as u64)
}

/// A state published by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A fraction was applied.
    Step(MachineState),
    /// No fraction applies; playback has stopped.
    Halt(MachineState),
}

impl Completion {
    pub fn state(&self) -> &MachineState {
        match self {
            Completion::Step(state) | Completion::Halt(state) => state,
        }
    }

    pub fn into_state(self) -> MachineState {
        match self {
            Completion::Step(state) | Completion::Halt(state) => state,
        }
    }
}

/// The one pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Suspension {
    phase: AnimationPhase,
    due: Duration,
}

/// Read-only view of the controller for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationSnapshot {
    pub phase: AnimationPhase,
    pub playing: bool,
    pub speed: u32,
    pub active_rule_index: Option<usize>,
    pub scanning_index: Option<usize>,
    pub target_rule_index: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AnimationController {
    phase: AnimationPhase,
    active_rule_index: Option<usize>,
    scanning_index: Option<usize>,
    target_rule_index: Option<usize>,
    speed: u32,
    instant_threshold: u32,
    playing: bool,
    /// Host-driven time.
    clock: Duration,
    /// Time the next timer is armed from: the last firing time, or when play started.
    anchor: Duration,
    pending: Option<Suspension>,
}

impl Default for AnimationController {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED, INSTANT_SPEED_THRESHOLD)
    }
}

impl AnimationController {
    /// Creates a stopped controller in the idle phase.
    pub fn new(speed: u32, instant_threshold: u32) -> Self {
        Self {
            phase: AnimationPhase::Idle,
            active_rule_index: None,
            scanning_index: None,
            target_rule_index: None,
            speed: speed.clamp(MIN_SPEED, MAX_SPEED),
            instant_threshold,
            playing: false,
            clock: Duration::ZERO,
            anchor: Duration::ZERO,
            pending: None,
        }
    }

    pub fn phase(&self) -> AnimationPhase {
        self.phase
    }

    /// The rule chosen for the current transition, set from `selecting` onwards.
    pub fn active_rule_index(&self) -> Option<usize> {
        self.active_rule_index
    }

    /// The rule under the scanning cursor while `scanning`.
    pub fn scanning_index(&self) -> Option<usize> {
        self.scanning_index
    }

    /// The rule the scan will stop at, computed when leaving `idle`.
    pub fn target_rule_index(&self) -> Option<usize> {
        self.target_rule_index
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    /// Sets the speed, clamped to `MIN_SPEED..=MAX_SPEED`. Applies from the next timer.
    pub fn set_speed(&mut self, speed: u32) {
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
    }

    /// Returns `true` when playback bypasses the animated phases.
    pub fn is_instant(&self) -> bool {
        self.speed > self.instant_threshold
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Returns `true` while a timer is armed.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn snapshot(&self) -> AnimationSnapshot {
        AnimationSnapshot {
            phase: self.phase,
            playing: self.playing,
            speed: self.speed,
            active_rule_index: self.active_rule_index,
            scanning_index: self.scanning_index,
            target_rule_index: self.target_rule_index,
        }
    }

    /// Starts or stops playback. Stopping is the same as [`AnimationController::stop`].
    pub fn set_playing(&mut self, playing: bool) {
        if !playing {
            self.stop();
        } else if !self.playing {
            self.playing = true;
            self.anchor = self.clock;
        }
    }

    /// Stops playback from any phase: cancels the pending timer, clears the transient
    /// markers and returns to `idle`. Idempotent.
    pub fn stop(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(phase = %pending.phase, "cancelled pending animation timer");
        }

        self.playing = false;
        self.phase = AnimationPhase::Idle;
        self.active_rule_index = None;
        self.scanning_index = None;
        self.target_rule_index = None;
    }

    /// Moves host time forward. Timers only fire from [`AnimationController::poll`].
    pub fn advance_clock(&mut self, elapsed: Duration) {
        self.clock += elapsed;
    }

    /// Time until the next timer fires, or `None` when stopped.
    ///
    /// While playing with nothing armed yet, the next timer is reported as if armed now.
    pub fn time_until_next(&self) -> Option<Duration> {
        if !self.playing {
            return None;
        }

        let due = match self.pending {
            Some(suspension) => suspension.due,
            None => self.anchor + phase_delay(self.phase, self.speed, self.is_instant()),
        };

        Some(due.saturating_sub(self.clock))
    }

    /// Fires every timer that is due, in order, until one publishes a state.
    ///
    /// The caller must publish the returned state before polling again so the next
    /// phase sees it as `state`.
    pub fn poll(&mut self, state: &MachineState, program: &Program) -> Option<Completion> {
        loop {
            if !self.playing {
                return None;
            }
            if state.halted {
                self.stop();
                return None;
            }

            let suspension = match self.pending {
                Some(suspension) => suspension,
                None => self.arm(),
            };

            if suspension.due > self.clock {
                return None;
            }

            self.pending = None;
            self.anchor = suspension.due;

            if let Some(completion) = self.fire(suspension.phase, state, program) {
                return Some(completion);
            }
        }
    }

    /// Arms the timer for the current phase.
    fn arm(&mut self) -> Suspension {
        let suspension = Suspension {
            phase: self.phase,
            due: self.anchor + phase_delay(self.phase, self.speed, self.is_instant()),
        };
        self.pending = Some(suspension);
        suspension
    }

    /// Runs the effect of `phase` completing.
    fn fire(
        &mut self,
        phase: AnimationPhase,
        state: &MachineState,
        program: &Program,
    ) -> Option<Completion> {
        match phase {
            AnimationPhase::Idle => {
                let target = first_applicable(&state.registers, program);

                if self.is_instant() {
                    return Some(match target {
                        Some(_) => Completion::Step(machine::step(state, program)),
                        None => self.halt(state, program),
                    });
                }

                self.target_rule_index = target;
                self.scanning_index = Some(0);
                self.phase = AnimationPhase::Scanning;
                None
            }
            AnimationPhase::Scanning => {
                let index = self.scanning_index.unwrap_or(0);

                if self.target_rule_index == Some(index) {
                    self.active_rule_index = Some(index);
                    self.scanning_index = None;
                    self.phase = AnimationPhase::Selecting;
                    None
                } else if index + 1 >= program.len() {
                    Some(self.halt(state, program))
                } else {
                    self.scanning_index = Some(index + 1);
                    None
                }
            }
            AnimationPhase::Selecting => {
                self.phase = AnimationPhase::Consuming;
                None
            }
            AnimationPhase::Consuming => {
                self.phase = AnimationPhase::Producing;
                None
            }
            AnimationPhase::Producing => {
                let next = machine::step(state, program);
                self.phase = AnimationPhase::Idle;
                self.active_rule_index = None;
                self.scanning_index = None;
                self.target_rule_index = None;
                Some(Completion::Step(next))
            }
        }
    }

    fn halt(&mut self, state: &MachineState, program: &Program) -> Completion {
        self.stop();
        Completion::Halt(machine::step(state, program))
    }
}
