//! One-shot deferred state transitions

use crate::machine::State;

#[derive(Debug, Clone, Copy)]
struct Delay {
    delay_us: u64,
    target: State,
    start_us: u64,
}

/// Pending deferred transitions, keyed by target state
#[derive(Debug, Default)]
pub struct DelayScheduler {
    scheduled: Vec<Delay>,
}

impl DelayScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a one-shot transition to `target` after `delay_us`
    ///
    /// A second schedule for the same target while one is pending is ignored,
    /// whatever its delay; re-arming a pending transition would push it out
    /// forever while the scheduling state keeps running.
    pub fn schedule(&mut self, delay_us: u64, target: State, now_us: u64) {
        if self.scheduled.iter().any(|delay| delay.target == target) {
            return;
        }
        self.scheduled.push(Delay {
            delay_us,
            target,
            start_us: now_us,
        });
    }

    /// Stages every expired transition and removes it from the pending set
    pub fn check_all(&mut self, now_us: u64, staged: &mut Option<State>) {
        self.scheduled.retain(|delay| {
            if now_us - delay.start_us > delay.delay_us {
                *staged = Some(delay.target);
                false
            } else {
                true
            }
        });
    }

    pub fn pending(&self) -> usize {
        self.scheduled.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_target_is_deduplicated() {
        let mut delays = DelayScheduler::new();
        delays.schedule(1_000_000, State::Unload, 0);
        delays.schedule(5_000_000, State::Unload, 100);
        assert_eq!(delays.pending(), 1);

        // the first-scheduled delay is the one that fires
        let mut staged = None;
        delays.check_all(1_000_001, &mut staged);
        assert_eq!(staged, Some(State::Unload));
        assert_eq!(delays.pending(), 0);
    }

    #[test]
    fn different_targets_coexist() {
        let mut delays = DelayScheduler::new();
        delays.schedule(1_000_000, State::Unload, 0);
        delays.schedule(2_000_000, State::BackAway, 0);
        assert_eq!(delays.pending(), 2);

        let mut staged = None;
        delays.check_all(1_500_000, &mut staged);
        assert_eq!(staged, Some(State::Unload));
        assert_eq!(delays.pending(), 1);

        staged = None;
        delays.check_all(2_500_000, &mut staged);
        assert_eq!(staged, Some(State::BackAway));
        assert_eq!(delays.pending(), 0);
    }

    #[test]
    fn fires_only_past_the_full_delay() {
        let mut delays = DelayScheduler::new();
        delays.schedule(1_000_000, State::Unload, 500);

        let mut staged = None;
        delays.check_all(1_000_500, &mut staged);
        assert_eq!(staged, None);

        delays.check_all(1_000_501, &mut staged);
        assert_eq!(staged, Some(State::Unload));
    }

    #[test]
    fn target_can_be_rearmed_after_firing() {
        let mut delays = DelayScheduler::new();
        delays.schedule(1_000, State::Unload, 0);
        let mut staged = None;
        delays.check_all(2_000, &mut staged);
        assert_eq!(delays.pending(), 0);

        delays.schedule(1_000, State::Unload, 2_000);
        assert_eq!(delays.pending(), 1);
    }
}
