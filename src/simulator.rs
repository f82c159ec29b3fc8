//! The engine facade: one `Simulator` owns the program, its history, event log,
//! animation controller and forecast, and is the only thing collaborators talk to.
//!
//! Every published state, whether from a manual step or from playback, goes through
//! the same path: push onto the history, then run the enabled detectors.

use num_bigint::BigUint;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::animation::{AnimationController, AnimationPhase, AnimationSnapshot};
use crate::events::{Detector, EventLog};
use crate::forecast::{forecast_halt_step, Forecast};
use crate::history::History;
use crate::machine;
use crate::parser::parse_program;
use crate::primes::{is_prime, PrimeExponentMap, PRIMES};
use crate::types::{
    EventKind, Fraction, FractranError, InvalidEdit, LoadOptions, MachineState, Preset, Program,
    SimulationEvent, SimulatorConfig,
};

#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    program: Program,
    editable: BTreeSet<u64>,
    history: History,
    events: EventLog,
    animation: AnimationController,
    forecast: Forecast,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl Simulator {
    /// Creates a simulator holding the empty program and empty registers.
    pub fn new(config: SimulatorConfig) -> Self {
        let program = Program::default();
        let registers = PrimeExponentMap::new();

        Self {
            forecast: forecast_halt_step(&registers, &program, config.forecast_limit),
            history: History::new(MachineState::root(registers), config.max_history),
            animation: AnimationController::new(config.initial_speed, config.instant_threshold),
            events: EventLog::default().with_capacity(config.max_events),
            editable: BTreeSet::new(),
            program,
            config,
        }
    }

    /// Creates a simulator with `preset` already loaded.
    pub fn with_preset(config: SimulatorConfig, preset: &Preset) -> Result<Self, FractranError> {
        let mut simulator = Self::new(config);
        simulator.load_preset(preset)?;
        Ok(simulator)
    }

    /// Parses `sources` and replaces the running program.
    ///
    /// On error nothing changes: the previous program, history and playback state are kept.
    pub fn load<S: AsRef<str>>(
        &mut self,
        sources: &[S],
        registers: PrimeExponentMap,
        options: LoadOptions,
    ) -> Result<(), FractranError> {
        let program = parse_program(sources).map_err(|e| {
            warn!(error = %e, "load rejected");
            e
        })?;
        check_editable(&options.editable_primes)?;

        self.install(program, registers, options);
        Ok(())
    }

    /// Loads a parsed program file.
    pub fn load_preset(&mut self, preset: &Preset) -> Result<(), FractranError> {
        check_editable(&preset.editable)?;

        self.install(preset.program.clone(), preset.registers.clone(), preset.options());
        info!(preset = %preset.name, "loaded preset");
        Ok(())
    }

    fn install(&mut self, program: Program, registers: PrimeExponentMap, options: LoadOptions) {
        self.animation.stop();

        self.forecast = forecast_halt_step(&registers, &program, self.config.forecast_limit);
        self.program = program;
        self.editable = options.editable_primes.into_iter().collect();
        self.history.replace_root(MachineState::root(registers));
        self.events.set_enabled(options.enabled_events);
        self.events.reset("Loaded.");

        info!(
            rules = self.program.len(),
            registers = %self.history.root().registers,
            forecast = %self.forecast,
            "loaded program"
        );
    }

    /// Publishes the successor of the current state.
    ///
    /// Stops playback first. Does nothing once the current state is halted.
    pub fn step(&mut self) -> &MachineState {
        self.animation.stop();

        if !self.history.current().halted {
            let next = machine::step(self.history.current(), &self.program);
            self.publish(next);
        }

        self.history.current()
    }

    /// Returns to the root state and clears the event log.
    pub fn reset(&mut self) {
        self.animation.stop();
        self.history.reset_to_root();
        self.events.reset("Reset.");
        debug!("reset to root");
    }

    /// Moves the history cursor to `index`, clamped, and returns the new cursor.
    pub fn scrub(&mut self, index: usize) -> usize {
        self.animation.stop();
        self.history.scrub_to(index)
    }

    /// Adds `delta` to the exponent of `prime` in the root state, clamping at zero.
    ///
    /// Only legal while the cursor is on a step-0 state and `prime` is editable; the
    /// forecast is recomputed on success.
    pub fn edit_register(&mut self, prime: u64, delta: i64) -> Result<(), InvalidEdit> {
        if self.history.current().step != 0 {
            debug!(prime, delta, "edit ignored away from step 0");
            return Err(InvalidEdit::NotAtRoot);
        }
        if !self.editable.contains(&prime) {
            debug!(prime, delta, "edit ignored on locked register");
            return Err(InvalidEdit::NotEditable(prime));
        }

        self.animation.stop();

        let mut registers = self.history.current().registers.clone();
        registers.adjust(prime, delta);

        self.forecast = forecast_halt_step(&registers, &self.program, self.config.forecast_limit);
        self.history.replace_root(MachineState::root(registers));

        debug!(prime, delta, forecast = %self.forecast, "edited register");
        Ok(())
    }

    pub fn set_speed(&mut self, speed: u32) {
        self.animation.set_speed(speed);
    }

    /// Starts or stops playback. Starting on a halted state is ignored.
    pub fn set_playing(&mut self, playing: bool) {
        if playing && self.history.current().halted {
            return;
        }
        self.animation.set_playing(playing);
    }

    pub fn toggle_playing(&mut self) {
        self.set_playing(!self.is_playing());
    }

    /// Stops playback and cancels any pending phase.
    pub fn stop(&mut self) {
        self.animation.stop();
    }

    /// Moves host time forward by `elapsed` and publishes every state that became due.
    ///
    /// Returns the number of states published.
    pub fn advance(&mut self, elapsed: Duration) -> usize {
        self.animation.advance_clock(elapsed);

        let mut published = 0;
        while let Some(completion) = self.animation.poll(self.history.current(), &self.program) {
            self.publish(completion.into_state());
            published += 1;
        }
        published
    }

    /// Registers an extra detector and enables it after the current ones.
    pub fn register_detector<D: Detector + 'static>(&mut self, kind: EventKind, detector: D) {
        self.events.registry_mut().register(kind.clone(), detector);

        let mut enabled = self.events.enabled().to_vec();
        enabled.push(kind);
        self.events.set_enabled(enabled);
    }

    fn publish(&mut self, next: MachineState) {
        let previous = self.history.current().clone();
        self.history.push(next);

        let current = self.history.current();
        let added = self.events.check(&previous, current);

        for event in added {
            info!(step = event.step, kind = %event.kind, "{}", event.message);
        }
        debug!(step = current.step, halted = current.halted, "published state");
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn current_state(&self) -> &MachineState {
        self.history.current()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_index(&self) -> usize {
        self.history.cursor()
    }

    pub fn events(&self) -> &[SimulationEvent] {
        self.events.events()
    }

    pub fn enabled_events(&self) -> &[EventKind] {
        self.events.enabled()
    }

    /// Forecast for the current root configuration.
    pub fn forecast(&self) -> Forecast {
        self.forecast
    }

    pub fn editable_primes(&self) -> impl Iterator<Item = u64> + '_ {
        self.editable.iter().copied()
    }

    pub fn is_editable(&self, prime: u64) -> bool {
        self.editable.contains(&prime)
    }

    /// The integer the current state represents.
    pub fn value(&self) -> BigUint {
        machine::value(&self.history.current().registers)
    }

    /// Primes worth showing as registers: every prime the rules, current registers or
    /// editable set mention, plus every smaller prime from the table, in ascending order.
    pub fn used_primes(&self) -> Vec<u64> {
        let mut used: BTreeSet<u64> = self
            .program
            .iter()
            .flat_map(|f| f.numerator_factors.primes().chain(f.denominator_factors.primes()))
            .chain(self.history.current().registers.primes())
            .chain(self.editable.iter().copied())
            .collect();

        if let Some(&max) = used.iter().next_back() {
            used.extend(PRIMES.iter().copied().take_while(|&p| p <= max));
        }

        used.into_iter().collect()
    }

    /// The rule under the scanning cursor while scanning, otherwise the chosen rule.
    pub fn active_rule(&self) -> Option<(usize, &Fraction)> {
        let index = match self.animation.phase() {
            AnimationPhase::Scanning => self.animation.scanning_index(),
            _ => self.animation.active_rule_index(),
        }?;

        self.program.get(index).map(|f| (index, f))
    }

    pub fn phase(&self) -> AnimationPhase {
        self.animation.phase()
    }

    pub fn animation(&self) -> AnimationSnapshot {
        self.animation.snapshot()
    }

    pub fn speed(&self) -> u32 {
        self.animation.speed()
    }

    pub fn is_playing(&self) -> bool {
        self.animation.is_playing()
    }

    /// How long the host may wait before the next call to `advance` has work to do.
    pub fn time_until_next_phase(&self) -> Option<Duration> {
        self.animation.time_until_next()
    }
}

fn check_editable(primes: &[u64]) -> Result<(), FractranError> {
    match primes.iter().find(|&&p| !is_prime(p)) {
        Some(p) => Err(FractranError::ValidationError(format!(
            "Editable register {p} is not a prime number"
        ))),
        None => Ok(()),
    }
}
