//! Cooperative multi-step tasks.
//!
//! Long operations (startup, save, load) are expressed as a queue of steps
//! that the owner drains one step per tick, yielding to the host loop in
//! between. Cancelling drops the remaining steps without running them.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct StepSequence<S> {
    pending: VecDeque<S>,
    step_index: usize,
    total_steps: usize,
    cancelled: bool,
}

impl<S> StepSequence<S> {
    pub fn new(steps: impl IntoIterator<Item = S>) -> Self {
        let pending: VecDeque<S> = steps.into_iter().collect();
        let total_steps = pending.len();
        Self {
            pending,
            step_index: 0,
            total_steps,
            cancelled: false,
        }
    }

    /// Take the next step to execute
    pub fn next_step(&mut self) -> Option<S> {
        let step = self.pending.pop_front()?;
        self.step_index += 1;
        Some(step)
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.pending.clear();
    }

    /// Number of steps already handed out
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 1.0;
        }
        self.step_index as f64 / self.total_steps as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_drain_in_order() {
        let mut sequence = StepSequence::new(["a", "b", "c"]);
        assert_eq!(sequence.next_step(), Some("a"));
        assert_eq!(sequence.step_index(), 1);
        assert_eq!(sequence.next_step(), Some("b"));
        assert!(!sequence.is_done());
        assert_eq!(sequence.next_step(), Some("c"));
        assert!(sequence.is_done());
        assert_eq!(sequence.next_step(), None);
        assert!((sequence.progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cancel_drops_remaining_steps() {
        let mut sequence = StepSequence::new(1..=4);
        sequence.next_step();
        sequence.cancel();
        assert!(sequence.is_cancelled());
        assert!(sequence.is_done());
        assert_eq!(sequence.next_step(), None);
        assert_eq!(sequence.step_index(), 1);
        assert_eq!(sequence.total_steps(), 4);
    }
}
