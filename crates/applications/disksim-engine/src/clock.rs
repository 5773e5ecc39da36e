//! Virtual clock and pending-event set
//!
//! Events are ordered by time, then by submission order, so events scheduled
//! for the same instant are dispatched FIFO. Time never goes backwards.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Handle to a process registered with the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub usize);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// A pending resumption of `process` at `time`
#[derive(Debug, Clone)]
pub struct TimedEvent<P> {
    pub time: f64,
    seq: u64,
    pub process: ProcessId,
    pub payload: P,
}

impl<P> TimedEvent<P> {
    /// Submission sequence number (tie-break among equal times)
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

// BinaryHeap is a max-heap, so compare in reverse: earliest time, then lowest seq
impl<P> Ord for TimedEvent<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<P> PartialOrd for TimedEvent<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Eq for TimedEvent<P> {}

impl<P> PartialEq for TimedEvent<P> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq && self.time.total_cmp(&other.time) == Ordering::Equal
    }
}

/// Current virtual time plus the set of pending events
#[derive(Debug)]
pub struct SimulationClock<P> {
    now: f64,
    next_seq: u64,
    pending: BinaryHeap<TimedEvent<P>>,
}

impl<P> Default for SimulationClock<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> SimulationClock<P> {
    pub fn new() -> Self {
        SimulationClock {
            now: 0.0,
            next_seq: 0,
            pending: BinaryHeap::new(),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Insert an event `delay` time units after now
    pub fn schedule(&mut self, process: ProcessId, delay: f64, payload: P) -> Result<()> {
        if !delay.is_finite() || delay < 0.0 {
            return Err(SimError::invariant(format!(
                "{process} scheduled with invalid delay {delay} at t={}",
                self.now
            )));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(TimedEvent {
            time: self.now + delay,
            seq,
            process,
            payload,
        });
        Ok(())
    }

    /// Pop the earliest event and advance time to it, unless the pending set
    /// is empty or the earliest event lies beyond `end_time`.
    pub fn next_until(&mut self, end_time: f64) -> Option<TimedEvent<P>> {
        if self.pending.peek()?.time > end_time {
            return None;
        }
        let event = self.pending.pop()?;
        self.now = event.time;
        Some(event)
    }

    /// Time of the earliest pending event
    pub fn peek_time(&self) -> Option<f64> {
        self.pending.peek().map(|e| e.time)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_dispatch_in_time_order() {
        let mut clock = SimulationClock::new();
        clock.schedule(ProcessId(0), 5.0, "late").unwrap();
        clock.schedule(ProcessId(1), 1.0, "early").unwrap();
        clock.schedule(ProcessId(2), 3.0, "middle").unwrap();

        let order: Vec<&str> = std::iter::from_fn(|| clock.next_until(f64::INFINITY))
            .map(|e| e.payload)
            .collect();
        assert_eq!(order, vec!["early", "middle", "late"]);
        assert_eq!(clock.now(), 5.0);
    }

    #[test]
    fn test_same_time_events_are_fifo() {
        let mut clock = SimulationClock::new();
        for i in 0..10 {
            clock.schedule(ProcessId(i), 2.0, i).unwrap();
        }
        clock.schedule(ProcessId(99), 0.0, 99).unwrap();

        let first = clock.next_until(f64::INFINITY).unwrap();
        assert_eq!(first.payload, 99);
        assert_eq!(first.seq(), 10);

        let rest: Vec<(u64, usize)> = std::iter::from_fn(|| clock.next_until(f64::INFINITY))
            .map(|e| (e.seq(), e.payload))
            .collect();
        let expected: Vec<(u64, usize)> = (0..10).map(|i| (i as u64, i)).collect();
        assert_eq!(rest, expected);
    }

    #[test]
    fn test_time_is_monotonic_and_relative() {
        let mut clock = SimulationClock::new();
        clock.schedule(ProcessId(0), 4.0, ()).unwrap();
        clock.next_until(f64::INFINITY).unwrap();
        assert_eq!(clock.now(), 4.0);

        // Delays are relative to the current time
        clock.schedule(ProcessId(0), 0.0, ()).unwrap();
        clock.schedule(ProcessId(0), 1.5, ()).unwrap();
        assert_eq!(clock.peek_time(), Some(4.0));

        let mut last = clock.now();
        while let Some(event) = clock.next_until(f64::INFINITY) {
            assert!(event.time >= last);
            last = event.time;
        }
        assert_eq!(clock.now(), 5.5);
    }

    #[test]
    fn test_rejects_negative_delay() {
        let mut clock: SimulationClock<()> = SimulationClock::new();
        assert!(clock.schedule(ProcessId(0), -1.0, ()).is_err());
        assert!(clock.schedule(ProcessId(0), f64::NAN, ()).is_err());
        assert!(clock.is_idle());
    }

    #[test]
    fn test_stops_at_end_time() {
        let mut clock = SimulationClock::new();
        clock.schedule(ProcessId(0), 10.0, ()).unwrap();
        clock.schedule(ProcessId(1), 20.0, ()).unwrap();

        assert!(clock.next_until(15.0).is_some());
        assert!(clock.next_until(15.0).is_none());
        // The event past the ceiling stays pending and time does not advance to it
        assert_eq!(clock.pending(), 1);
        assert_eq!(clock.now(), 10.0);
    }
}
