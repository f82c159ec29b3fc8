//! Event detection over published transitions.
//!
//! A `DetectorRegistry` maps each `EventKind` to a pure predicate over
//! `(previous, next)` states. An `EventLog` evaluates the enabled kinds, in the order
//! they were enabled, on every transition and appends whatever they report.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::types::{EventKind, MachineState, SimulationEvent, MAX_EVENTS_DEFAULT};

/// What a detector reports. The log stamps it with a kind and step.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub message: String,
    pub data: Option<Value>,
}

impl Detection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A pure predicate over a state transition.
pub trait Detector: Send + Sync {
    fn detect(&self, previous: &MachineState, next: &MachineState) -> Option<Detection>;
}

impl<F> Detector for F
where
    F: Fn(&MachineState, &MachineState) -> Option<Detection> + Send + Sync,
{
    fn detect(&self, previous: &MachineState, next: &MachineState) -> Option<Detection> {
        self(previous, next)
    }
}

/// Fires when a running machine halts.
pub fn detect_halt(previous: &MachineState, next: &MachineState) -> Option<Detection> {
    (!previous.halted && next.halted).then(|| Detection::new("Program Halted"))
}

/// Fires when the registers reduce to `2^e` with `e > 1`. Under PRIMEGAME `e` is prime.
pub fn detect_power_of_two(_previous: &MachineState, next: &MachineState) -> Option<Detection> {
    let registers = &next.registers;
    let exponent = registers.get(2);

    (registers.len() == 1 && exponent > 1).then(|| {
        Detection::new(format!("2^{exponent} (Prime found: {exponent})")).with_data(json!(exponent))
    })
}

/// Fires when registers 2 and 3 are the only non-empty ones.
pub fn detect_fibonacci_pair(_previous: &MachineState, next: &MachineState) -> Option<Detection> {
    if next.registers.primes().any(|p| p >= 5) {
        return None;
    }

    let a = next.registers.get(2);
    let b = next.registers.get(3);

    (a > 0 || b > 0).then(|| {
        Detection::new(format!("Sequence: ({a}, {b})")).with_data(json!({ "a": a, "b": b }))
    })
}

/// Maps event kinds to their detectors.
#[derive(Default)]
pub struct DetectorRegistry {
    detectors: HashMap<EventKind, Box<dyn Detector>>,
}

impl DetectorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the halt, power-of-two and Fibonacci-pair detectors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(EventKind::Halted, detect_halt);
        registry.register(EventKind::PowerOfTwo, detect_power_of_two);
        registry.register(EventKind::FibonacciPair, detect_fibonacci_pair);
        registry
    }

    /// Registers `detector` for `kind`, replacing any previous one.
    pub fn register<D: Detector + 'static>(&mut self, kind: EventKind, detector: D) {
        self.detectors.insert(kind, Box::new(detector));
    }

    pub fn get(&self, kind: &EventKind) -> Option<&dyn Detector> {
        self.detectors.get(kind).map(|d| d.as_ref())
    }

    pub fn contains(&self, kind: &EventKind) -> bool {
        self.detectors.contains_key(kind)
    }

    /// Registered kinds, in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = &EventKind> + '_ {
        self.detectors.keys()
    }
}

impl fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.detectors.keys()).finish()
    }
}

/// Append-only log of simulation events, keeping the most recent `capacity` entries.
#[derive(Debug)]
pub struct EventLog {
    registry: DetectorRegistry,
    enabled: Vec<EventKind>,
    events: Vec<SimulationEvent>,
    capacity: usize,
}

impl EventLog {
    /// Creates a log seeded with an info message at step 0.
    pub fn new(registry: DetectorRegistry, enabled: Vec<EventKind>, message: &str) -> Self {
        let mut log = Self {
            registry,
            enabled: Vec::new(),
            events: Vec::new(),
            capacity: MAX_EVENTS_DEFAULT,
        };
        log.set_enabled(enabled);
        log.reset(message);
        log
    }

    /// Sets how many events are retained. At least one is always kept.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self.evict();
        self
    }

    /// Evaluates each enabled detector on the transition and appends the results.
    ///
    /// Returns the events added by this call that are still retained.
    pub fn check(&mut self, previous: &MachineState, next: &MachineState) -> &[SimulationEvent] {
        let start = self.events.len();

        for kind in &self.enabled {
            let Some(detector) = self.registry.get(kind) else {
                continue;
            };

            if let Some(detection) = detector.detect(previous, next) {
                self.events.push(SimulationEvent {
                    step: next.step,
                    kind: kind.clone(),
                    message: detection.message,
                    data: detection.data,
                });
            }
        }

        let added = self.events.len() - start;
        self.evict();

        let len = self.events.len();
        &self.events[len - added.min(len)..]
    }

    /// Clears the log and records `message` at step 0.
    pub fn reset(&mut self, message: &str) {
        self.events.clear();
        self.push_info(0, message);
    }

    /// Appends an info event.
    pub fn push_info(&mut self, step: u64, message: &str) {
        self.events.push(SimulationEvent {
            step,
            kind: EventKind::Info,
            message: message.to_string(),
            data: None,
        });
        self.evict();
    }

    /// Drops the oldest events beyond the capacity.
    fn evict(&mut self) {
        if self.events.len() > self.capacity {
            let excess = self.events.len() - self.capacity;
            self.events.drain(..excess);
            debug!(capacity = self.capacity, excess, "event log dropped oldest events");
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replaces the enabled kinds. Duplicates are dropped, keeping the first occurrence.
    pub fn set_enabled(&mut self, kinds: Vec<EventKind>) {
        self.enabled.clear();
        for kind in kinds {
            if !self.enabled.contains(&kind) {
                self.enabled.push(kind);
            }
        }
    }

    pub fn enabled(&self) -> &[EventKind] {
        &self.enabled
    }

    pub fn events(&self) -> &[SimulationEvent] {
        &self.events
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DetectorRegistry {
        &mut self.registry
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DetectorRegistry::with_builtins(), vec![EventKind::Halted], "Loaded.")
    }
}
