//! Pacing of the collector and the learner in overlapped execution.
use super::StopHandle;
use crate::error::DistrlError;
use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex, MutexGuard},
    time::Duration,
};

/// Returns `true` if an optimization step is due after `total_steps` agent steps.
pub fn is_train_tick(total_steps: usize, warm_up: usize, train_freq: usize) -> bool {
    total_steps >= warm_up && total_steps % train_freq == 0
}

#[derive(Debug, Default)]
struct State {
    /// Agent steps of issued ticks not yet taken by the learner.
    queue: VecDeque<usize>,
    issued: usize,
    done: usize,
    closed: bool,
}

/// Counter of training ticks shared by the collector and the learner.
///
/// The collector reports every agent step with [`Cadence::step_collected`], which issues
/// a tick when an optimization step is due. The learner takes ticks with
/// [`Cadence::next_tick`] and reports them with [`Cadence::tick_done`]. The collector
/// runs at most `max_ahead` unfinished ticks ahead of the learner.
pub struct Cadence {
    state: Mutex<State>,
    changed: Condvar,
    warm_up: usize,
    train_freq: usize,
    max_ahead: usize,
    poll: Duration,
}

impl Cadence {
    /// `poll` is the interval at which waits re-check the stop flag.
    pub fn new(warm_up: usize, train_freq: usize, max_ahead: usize, poll: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            changed: Condvar::new(),
            warm_up,
            train_freq,
            max_ahead: max_ahead.max(1),
            poll,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, DistrlError> {
        self.state
            .lock()
            .map_err(|_| DistrlError::LockPoisoned("cadence"))
    }

    fn wait<'a>(&self, state: MutexGuard<'a, State>) -> Result<MutexGuard<'a, State>, DistrlError> {
        Ok(self
            .changed
            .wait_timeout(state, self.poll)
            .map_err(|_| DistrlError::LockPoisoned("cadence"))?
            .0)
    }

    /// Blocks the collector while it is too far ahead of the learner.
    ///
    /// Returns `false` if the collector should stop.
    pub fn wait_collect_permit(&self, stop: &StopHandle) -> Result<bool, DistrlError> {
        let mut state = self.lock()?;
        loop {
            if state.closed || stop.is_stopped() {
                return Ok(false);
            }
            if state.issued - state.done <= self.max_ahead {
                return Ok(true);
            }
            state = self.wait(state)?;
        }
    }

    /// Reports an agent step. Returns `true` if it issued a tick.
    pub fn step_collected(&self, total_steps: usize) -> Result<bool, DistrlError> {
        if !is_train_tick(total_steps, self.warm_up, self.train_freq) {
            return Ok(false);
        }
        let mut state = self.lock()?;
        state.queue.push_back(total_steps);
        state.issued += 1;
        drop(state);
        self.changed.notify_all();
        Ok(true)
    }

    /// Blocks the learner until a tick is issued.
    ///
    /// Returns the agent step of the tick, or `None` once the cadence is closed and
    /// drained or a stop is requested.
    pub fn next_tick(&self, stop: &StopHandle) -> Result<Option<usize>, DistrlError> {
        let mut state = self.lock()?;
        loop {
            if stop.is_stopped() {
                return Ok(None);
            }
            if let Some(t) = state.queue.pop_front() {
                return Ok(Some(t));
            }
            if state.closed {
                return Ok(None);
            }
            state = self.wait(state)?;
        }
    }

    /// Reports that the learner finished its current tick.
    pub fn tick_done(&self) -> Result<(), DistrlError> {
        self.lock()?.done += 1;
        self.changed.notify_all();
        Ok(())
    }

    /// Closes the cadence. Pending ticks can still be taken.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        self.changed.notify_all();
    }

    /// Returns `true` once the cadence is closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_is_train_tick() {
        assert!(!is_train_tick(4, 10, 4));
        assert!(is_train_tick(12, 10, 4));
        assert!(!is_train_tick(13, 10, 4));
    }

    #[test]
    fn test_ticks_in_order_and_drained_after_close() {
        let cadence = Cadence::new(0, 2, 10, Duration::from_millis(1));
        let stop = StopHandle::new();
        for t in 1..=6 {
            cadence.step_collected(t).unwrap();
        }
        cadence.close();
        let mut ticks = vec![];
        while let Some(t) = cadence.next_tick(&stop).unwrap() {
            ticks.push(t);
            cadence.tick_done().unwrap();
        }
        assert_eq!(ticks, vec![2, 4, 6]);
    }

    #[test]
    fn test_collector_bounded_ahead() {
        let cadence = Arc::new(Cadence::new(0, 1, 1, Duration::from_millis(1)));
        let stop = StopHandle::new();
        let c = cadence.clone();
        let s = stop.clone();
        let collector = thread::spawn(move || {
            let mut max_ahead = 0;
            for t in 1..=50 {
                if !c.wait_collect_permit(&s).unwrap() {
                    break;
                }
                c.step_collected(t).unwrap();
                let state = c.state.lock().unwrap();
                max_ahead = max_ahead.max(state.issued - state.done);
            }
            c.close();
            max_ahead
        });
        let mut n = 0;
        while cadence.next_tick(&stop).unwrap().is_some() {
            thread::sleep(Duration::from_micros(200));
            cadence.tick_done().unwrap();
            n += 1;
        }
        let max_ahead = collector.join().unwrap();
        assert_eq!(n, 50);
        assert!(max_ahead <= 2, "{}", max_ahead);
    }

    #[test]
    fn test_stop_releases_waiters() {
        let cadence = Cadence::new(0, 1, 1, Duration::from_millis(1));
        let stop = StopHandle::new();
        stop.stop();
        assert_eq!(cadence.next_tick(&stop).unwrap(), None);
        assert!(!cadence.wait_collect_permit(&stop).unwrap());
    }
}
