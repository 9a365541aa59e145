//! Frame-counted countdown timers.
//!
//! Timers tick once per fixed step. A timer may carry a cancellation
//! predicate over some caller state `S`; it is checked before each tick
//! and a cancelled timer never completes.

use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u32);

struct Timer<S> {
    id: TimerId,
    frames_remaining: u32,
    cancel_if: Option<Box<dyn Fn(&S) -> bool>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    Completed(TimerId),
    Cancelled(TimerId),
}

pub struct TimeKeeper<S> {
    step: Duration,
    timers: Vec<Timer<S>>,
    next_id: u32,
}

impl<S> TimeKeeper<S> {
    pub fn new(step: Duration) -> Self {
        Self {
            step,
            timers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn start(&mut self, seconds: f32) -> TimerId {
        self.insert(seconds, None)
    }

    pub fn start_with_cancel(
        &mut self,
        seconds: f32,
        cancel_if: impl Fn(&S) -> bool + 'static,
    ) -> TimerId {
        self.insert(seconds, Some(Box::new(cancel_if)))
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    pub fn seconds_remaining(&self, id: TimerId) -> f32 {
        self.timers
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.frames_remaining as f32 * self.step.as_secs_f32())
            .unwrap_or(0.0)
    }

    /// Advance every timer by one step.
    pub fn update(&mut self, state: &S) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        self.timers.retain_mut(|timer| {
            if timer.cancel_if.as_ref().is_some_and(|cancel| cancel(state)) {
                events.push(TimerEvent::Cancelled(timer.id));
                return false;
            }
            timer.frames_remaining = timer.frames_remaining.saturating_sub(1);
            if timer.frames_remaining == 0 {
                events.push(TimerEvent::Completed(timer.id));
                return false;
            }
            true
        });
        events
    }

    fn insert(&mut self, seconds: f32, cancel_if: Option<Box<dyn Fn(&S) -> bool>>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let step = self.step.as_secs_f32().max(f32::EPSILON);
        self.timers.push(Timer {
            id,
            frames_remaining: (seconds.max(0.0) / step).round() as u32,
            cancel_if,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const STEP: Duration = Duration::from_millis(100);

    #[test]
    fn test_timer_completes_after_its_frames() {
        let mut keeper = TimeKeeper::<()>::new(STEP);
        let id = keeper.start(0.3);
        assert_relative_eq!(keeper.seconds_remaining(id), 0.3, epsilon = 1e-5);

        assert!(keeper.update(&()).is_empty());
        assert!(keeper.update(&()).is_empty());
        assert_eq!(keeper.update(&()), vec![TimerEvent::Completed(id)]);
        assert!(!keeper.is_active(id));
    }

    #[test]
    fn test_cancel_predicate_runs_before_the_tick() {
        let mut keeper = TimeKeeper::<bool>::new(STEP);
        let id = keeper.start_with_cancel(0.1, |airborne| *airborne);
        assert_eq!(keeper.update(&true), vec![TimerEvent::Cancelled(id)]);
        assert!(!keeper.is_active(id));
    }

    #[test]
    fn test_zero_length_timer_completes_on_first_update() {
        let mut keeper = TimeKeeper::<()>::new(STEP);
        let id = keeper.start(0.0);
        assert_eq!(keeper.update(&()), vec![TimerEvent::Completed(id)]);
    }

    #[test]
    fn test_timers_run_independently() {
        let mut keeper = TimeKeeper::<bool>::new(STEP);
        let short = keeper.start(0.1);
        let guarded = keeper.start_with_cancel(0.5, |airborne| *airborne);
        assert_eq!(keeper.update(&false), vec![TimerEvent::Completed(short)]);
        assert!(keeper.is_active(guarded));
        assert_relative_eq!(keeper.seconds_remaining(guarded), 0.4, epsilon = 1e-5);
    }
}
