//! The disk head: a single-slot resource guarding the arm
//!
//! At most one request holds the head at a time. Requests that arrive while
//! it is busy join the waiting set; on release the active discipline picks
//! the next admission. The arm position changes only at admission, to the
//! admitted request's track.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::clock::ProcessId;
use crate::discipline::{Direction, QueueDiscipline};
use crate::error::{Result, SimError};
use crate::monitor::Monitor;

/// A request waiting for the head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waiter {
    pub process: ProcessId,
    pub track: u32,
}

impl Waiter {
    pub fn new(process: ProcessId, track: u32) -> Self {
        Waiter { process, track }
    }
}

/// Outcome of admitting a request to the head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub process: ProcessId,
    pub track: u32,
    /// Arm position before the move, used for the seek distance
    pub from_position: u32,
    /// Sweep direction in effect once this request was chosen
    pub direction: Option<Direction>,
    /// Chosen from the waiting set rather than taken on a free head
    pub queued: bool,
}

impl Admission {
    /// Tracks crossed by the arm for this admission
    pub fn distance(&self) -> u32 {
        self.track.abs_diff(self.from_position)
    }
}

/// Mutual-exclusion resource for the disk arm
#[derive(Debug)]
pub struct DiskHead {
    position: u32,
    holder: Option<ProcessId>,
    waiting: Vec<Waiter>,
    discipline: Box<dyn QueueDiscipline>,
    queue_length: Monitor,
}

impl DiskHead {
    /// Create an idle head at `position`
    pub fn new(discipline: Box<dyn QueueDiscipline>, position: u32) -> Self {
        let mut queue_length = Monitor::new("Read queue length");
        queue_length.observe_at(0.0, 0.0);
        DiskHead {
            position,
            holder: None,
            waiting: Vec::new(),
            discipline,
            queue_length,
        }
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn holder(&self) -> Option<ProcessId> {
        self.holder
    }

    pub fn is_busy(&self) -> bool {
        self.holder.is_some()
    }

    /// Waiting set, in enqueue order
    pub fn waiting(&self) -> &[Waiter] {
        &self.waiting
    }

    pub fn discipline_name(&self) -> &'static str {
        self.discipline.name()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.discipline.direction()
    }

    /// Timestamped waiting-set lengths
    pub fn queue_length_monitor(&self) -> &Monitor {
        &self.queue_length
    }

    /// Ask for the head on behalf of `process`, which wants `track`.
    ///
    /// Returns the admission when the head is free; otherwise the request
    /// joins the waiting set and `None` is returned.
    pub fn acquire(&mut self, process: ProcessId, track: u32, now: f64) -> Result<Option<Admission>> {
        if self.holder == Some(process) || self.waiting.iter().any(|w| w.process == process) {
            return Err(SimError::invariant(format!(
                "{process} requested the head twice"
            )));
        }

        if self.holder.is_none() {
            return self.admit(process, track, false).map(Some);
        }

        self.waiting.push(Waiter::new(process, track));
        self.queue_length.observe_at(self.waiting.len() as f64, now);
        trace!(%process, track, waiting = self.waiting.len(), "request queued for head");
        Ok(None)
    }

    /// Free the head held by `process` and admit the discipline's choice
    /// from the waiting set, if any.
    pub fn release(&mut self, process: ProcessId, now: f64) -> Result<Option<Admission>> {
        if self.holder != Some(process) {
            return Err(SimError::invariant(format!(
                "{process} released the head held by {:?}",
                self.holder
            )));
        }
        self.holder = None;

        let Some(idx) = self.discipline.select_next(&self.waiting, self.position)? else {
            return Ok(None);
        };
        if idx >= self.waiting.len() {
            return Err(SimError::invariant(format!(
                "{} selected index {idx} of {} waiters",
                self.discipline.name(),
                self.waiting.len()
            )));
        }

        let next = self.waiting.remove(idx);
        self.queue_length.observe_at(self.waiting.len() as f64, now);
        self.admit(next.process, next.track, true).map(Some)
    }

    fn admit(&mut self, process: ProcessId, track: u32, queued: bool) -> Result<Admission> {
        if let Some(holder) = self.holder {
            return Err(SimError::invariant(format!(
                "admitting {process} while {holder} holds the head"
            )));
        }
        let from_position = self.position;
        self.position = track;
        self.holder = Some(process);
        Ok(Admission {
            process,
            track,
            from_position,
            direction: self.discipline.direction(),
            queued,
        })
    }
}
