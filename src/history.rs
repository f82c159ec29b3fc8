//! Bounded, scrub-capable log of machine states.
//!
//! The log is a deque addressed through a cursor. Pushing after a scrub discards the
//! recorded future; exceeding capacity evicts from the front and shifts the cursor so it
//! keeps pointing at the same state. The root state is kept aside so a reset always
//! returns to step 0, even after the front of the log has been evicted.

use std::collections::VecDeque;
use tracing::debug;

use crate::types::MachineState;

#[derive(Debug, Clone)]
pub struct History {
    root: MachineState,
    states: VecDeque<MachineState>,
    cursor: usize,
    capacity: usize,
    /// Number of states evicted from the front since the last reset.
    evicted: usize,
}

impl History {
    /// Creates a single-entry log holding `root`. A capacity below 1 is raised to 1.
    pub fn new(root: MachineState, capacity: usize) -> Self {
        Self {
            states: VecDeque::from([root.clone()]),
            root,
            cursor: 0,
            capacity: capacity.max(1),
            evicted: 0,
        }
    }

    /// Appends `next` after the cursor, discarding any states beyond it.
    pub fn push(&mut self, next: MachineState) {
        self.states.truncate(self.cursor + 1);
        self.states.push_back(next);
        self.cursor = self.states.len() - 1;

        if self.states.len() > self.capacity {
            self.states.pop_front();
            self.cursor -= 1;
            self.evicted += 1;
            debug!(
                capacity = self.capacity,
                evicted = self.evicted,
                "history evicted oldest state"
            );
        }
    }

    /// Moves the cursor to `index`, clamped to the log, and returns the new cursor.
    pub fn scrub_to(&mut self, index: usize) -> usize {
        self.cursor = index.min(self.states.len() - 1);
        self.cursor
    }

    /// Truncates the log to the root state.
    pub fn reset_to_root(&mut self) {
        self.states.clear();
        self.states.push_back(self.root.clone());
        self.cursor = 0;
        self.evicted = 0;
    }

    /// Discards everything and starts over from `root`.
    pub fn replace_root(&mut self, root: MachineState) {
        self.root = root;
        self.reset_to_root();
    }

    /// Returns the state under the cursor.
    pub fn current(&self) -> &MachineState {
        // The log always holds at least one state and the cursor stays in range.
        &self.states[self.cursor]
    }

    pub fn root(&self) -> &MachineState {
        &self.root
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always `false`: the log holds at least the root.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of states evicted from the front, i.e. the logical index of entry 0.
    pub fn offset(&self) -> usize {
        self.evicted
    }

    pub fn get(&self, index: usize) -> Option<&MachineState> {
        self.states.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MachineState> + '_ {
        self.states.iter()
    }

    pub fn is_at_start(&self) -> bool {
        self.cursor == 0
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor == self.states.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::step;
    use crate::parser::parse_program;
    use crate::primes::PrimeExponentMap;
    use crate::types::Program;

    fn counting_program() -> Program {
        parse_program(&["2/1"]).unwrap()
    }

    fn run(history: &mut History, program: &Program, steps: usize) {
        for _ in 0..steps {
            let next = step(history.current(), program);
            history.push(next);
        }
    }

    #[test]
    fn test_push_advances_cursor() {
        let program = counting_program();
        let mut history = History::new(MachineState::root(PrimeExponentMap::new()), 100);

        run(&mut history, &program, 5);

        assert_eq!(history.len(), 6);
        assert_eq!(history.cursor(), 5);
        assert_eq!(history.current().step, 5);
        assert!(history.is_at_end());
        assert!(!history.is_empty());
    }

    #[test]
    fn test_consecutive_entries_are_transitions() {
        let program = counting_program();
        let mut history = History::new(MachineState::root(PrimeExponentMap::new()), 100);
        run(&mut history, &program, 10);

        let states: Vec<_> = history.iter().collect();
        for pair in states.windows(2) {
            assert_eq!(&step(pair[0], &program), pair[1]);
        }
    }

    #[test]
    fn test_scrub_clamps() {
        let program = counting_program();
        let mut history = History::new(MachineState::root(PrimeExponentMap::new()), 100);
        run(&mut history, &program, 3);

        assert_eq!(history.scrub_to(1), 1);
        assert_eq!(history.current().step, 1);
        assert_eq!(history.len(), 4);

        assert_eq!(history.scrub_to(99), 3);
        assert!(history.is_at_end());
    }

    #[test]
    fn test_push_after_scrub_discards_future() {
        let program = counting_program();
        let mut history = History::new(MachineState::root(PrimeExponentMap::new()), 100);
        run(&mut history, &program, 5);

        history.scrub_to(2);
        run(&mut history, &program, 1);

        assert_eq!(history.len(), 4);
        assert_eq!(history.cursor(), 3);
        assert_eq!(history.current().step, 3);
    }

    #[test]
    fn test_capacity_eviction_keeps_cursor_on_same_state() {
        let program = counting_program();
        let mut history = History::new(MachineState::root(PrimeExponentMap::new()), 4);
        run(&mut history, &program, 10);

        assert_eq!(history.len(), 4);
        assert_eq!(history.offset(), 7);
        assert_eq!(history.get(0).unwrap().step, 7);
        assert_eq!(history.current().step, 10);
        assert_eq!(history.cursor(), 3);
    }

    #[test]
    fn test_capacity_of_one() {
        let program = counting_program();
        let mut history = History::new(MachineState::root(PrimeExponentMap::new()), 0);
        run(&mut history, &program, 3);

        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), 0);
        assert_eq!(history.current().step, 3);
    }

    #[test]
    fn test_reset_to_root_after_eviction() {
        let program = counting_program();
        let mut history = History::new(MachineState::root(PrimeExponentMap::new()), 3);
        run(&mut history, &program, 6);

        history.reset_to_root();

        assert_eq!(history.len(), 1);
        assert_eq!(history.offset(), 0);
        assert_eq!(history.current(), &MachineState::root(PrimeExponentMap::new()));
        assert!(history.is_at_start());
    }

    #[test]
    fn test_replace_root() {
        let program = counting_program();
        let mut history = History::new(MachineState::root(PrimeExponentMap::new()), 10);
        run(&mut history, &program, 3);

        let root = MachineState::root(PrimeExponentMap::factorize(9));
        history.replace_root(root.clone());

        assert_eq!(history.len(), 1);
        assert_eq!(history.current(), &root);
        assert_eq!(history.root(), &root);
    }
}
