//! Queue disciplines for the disk head
//!
//! A discipline decides which waiting request is admitted next whenever the
//! head becomes free. Implements the three policies under comparison:
//! - FCFS: pure arrival order
//! - SSTF: nearest track to the current arm position
//! - SCAN: elevator sweep, reversing only when nothing lies ahead
//!
//! The waiting slice handed to a discipline is always in enqueue order, so
//! "earliest arrival" means "lowest index".

use std::cmp::Reverse;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Algorithm;
use crate::error::{Result, SimError};
use crate::head::Waiter;

/// Queue discipline trait
pub trait QueueDiscipline: fmt::Debug {
    /// Pick the index into `waiting` of the next request to admit, given the
    /// arm's current `position`. Returns `None` only for an empty slice.
    fn select_next(&mut self, waiting: &[Waiter], position: u32) -> Result<Option<usize>>;

    /// Get discipline name
    fn name(&self) -> &'static str;

    /// Current sweep direction, for disciplines that have one
    fn direction(&self) -> Option<Direction> {
        None
    }
}

impl Algorithm {
    /// Build the discipline for this algorithm
    pub fn discipline(&self) -> Box<dyn QueueDiscipline> {
        match self {
            Algorithm::Fcfs => Box::new(Fcfs),
            Algorithm::Sstf => Box::new(Sstf),
            Algorithm::Scan => Box::new(Scan::new(Direction::Forward)),
        }
    }
}

/// First-come-first-served
#[derive(Debug, Clone, Copy, Default)]
pub struct Fcfs;

impl QueueDiscipline for Fcfs {
    fn select_next(&mut self, waiting: &[Waiter], _position: u32) -> Result<Option<usize>> {
        Ok(if waiting.is_empty() { None } else { Some(0) })
    }

    fn name(&self) -> &'static str {
        "FCFS"
    }
}

/// Shortest-seek-time-first: minimize `|track - position|`, ties to the
/// earliest arrival
#[derive(Debug, Clone, Copy, Default)]
pub struct Sstf;

impl QueueDiscipline for Sstf {
    fn select_next(&mut self, waiting: &[Waiter], position: u32) -> Result<Option<usize>> {
        Ok(waiting
            .iter()
            .enumerate()
            .min_by_key(|(i, w)| (w.track.abs_diff(position), *i))
            .map(|(i, _)| i))
    }

    fn name(&self) -> &'static str {
        "SSTF"
    }
}

/// Sweep direction of the SCAN arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Towards higher track numbers
    Forward,
    /// Towards lower track numbers
    Backward,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    /// Whether `track` lies ahead of (or at) `position` in this direction
    pub fn is_ahead(self, track: u32, position: u32) -> bool {
        match self {
            Direction::Forward => track >= position,
            Direction::Backward => track <= position,
        }
    }
}

/// Elevator algorithm
///
/// While sweeping forward, admit the smallest track at or beyond the arm;
/// when no such request exists, reverse and admit the largest track at or
/// before it. Symmetric when sweeping backward. A non-empty waiting set
/// always yields an admission.
#[derive(Debug, Clone)]
pub struct Scan {
    direction: Direction,
    pub flips: usize,
}

impl Scan {
    pub fn new(direction: Direction) -> Self {
        Scan { direction, flips: 0 }
    }

    /// Nearest request ahead of the arm in `direction`, ties to earliest arrival
    fn nearest_ahead(waiting: &[Waiter], position: u32, direction: Direction) -> Option<usize> {
        let ahead = waiting
            .iter()
            .enumerate()
            .filter(|(_, w)| direction.is_ahead(w.track, position));
        let chosen = match direction {
            Direction::Forward => ahead.min_by_key(|(i, w)| (w.track, *i)),
            Direction::Backward => ahead.min_by_key(|(i, w)| (Reverse(w.track), *i)),
        };
        chosen.map(|(i, _)| i)
    }

    /// Priority-key formulation of the same choice: admit the waiter with the
    /// lowest [`scan_priority`], ties to earliest arrival, and reverse when
    /// that waiter lies behind the arm. Agrees with [`QueueDiscipline::select_next`].
    pub fn select_by_priority(&mut self, waiting: &[Waiter], position: u32) -> Option<usize> {
        let (idx, behind) = waiting
            .iter()
            .enumerate()
            .map(|(i, w)| (scan_priority(w.track, position, self.direction), i))
            .min()
            .map(|((behind, _), i)| (i, behind))?;
        if behind {
            self.direction = self.direction.flipped();
            self.flips += 1;
        }
        Some(idx)
    }
}

impl QueueDiscipline for Scan {
    fn select_next(&mut self, waiting: &[Waiter], position: u32) -> Result<Option<usize>> {
        if waiting.is_empty() {
            return Ok(None);
        }
        if let Some(idx) = Self::nearest_ahead(waiting, position, self.direction) {
            return Ok(Some(idx));
        }

        // Nothing ahead: reversing is mandatory and must find a request
        self.direction = self.direction.flipped();
        self.flips += 1;
        debug!(
            position,
            direction = ?self.direction,
            waiting = waiting.len(),
            "SCAN reversed direction"
        );
        Self::nearest_ahead(waiting, position, self.direction)
            .map(Some)
            .ok_or_else(|| {
                SimError::invariant(format!(
                    "SCAN found no admission for {} waiting requests at track {position}",
                    waiting.len()
                ))
            })
    }

    fn name(&self) -> &'static str {
        "SCAN"
    }

    fn direction(&self) -> Option<Direction> {
        Some(self.direction)
    }
}

/// Lexicographic SCAN priority: `(behind the arm, distance)`. Lower sorts first.
///
/// Requests ahead of the arm always outrank requests behind it, whatever the
/// track range, so no wraparound constant is needed.
pub fn scan_priority(track: u32, position: u32, direction: Direction) -> (bool, u32) {
    (!direction.is_ahead(track, position), track.abs_diff(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ProcessId;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn waiters(tracks: &[u32]) -> Vec<Waiter> {
        tracks
            .iter()
            .enumerate()
            .map(|(i, &track)| Waiter::new(ProcessId(i), track))
            .collect()
    }

    /// Drain `waiting` through `discipline`, moving the arm to each admitted track
    fn admission_order(
        discipline: &mut dyn QueueDiscipline,
        mut waiting: Vec<Waiter>,
        mut position: u32,
    ) -> Vec<u32> {
        let mut order = Vec::new();
        while let Some(idx) = discipline.select_next(&waiting, position).unwrap() {
            let chosen = waiting.remove(idx);
            position = chosen.track;
            order.push(chosen.track);
        }
        order
    }

    #[test]
    fn test_fcfs_ignores_distance() {
        let order = admission_order(&mut Fcfs, waiters(&[50, 10, 90]), 0);
        assert_eq!(order, vec![50, 10, 90]);
    }

    #[test]
    fn test_empty_waiting_set() {
        assert_eq!(Fcfs.select_next(&[], 0).unwrap(), None);
        assert_eq!(Sstf.select_next(&[], 0).unwrap(), None);
        let mut scan = Scan::new(Direction::Forward);
        assert_eq!(scan.select_next(&[], 0).unwrap(), None);
        assert_eq!(scan.flips, 0);
    }

    #[test]
    fn test_sstf_nearest_first() {
        let order = admission_order(&mut Sstf, waiters(&[10, 90, 50]), 0);
        assert_eq!(order, vec![10, 50, 90]);
    }

    #[test]
    fn test_sstf_tie_goes_to_earliest_arrival() {
        let waiting = waiters(&[60, 40, 40, 60]);
        assert_eq!(Sstf.select_next(&waiting, 50).unwrap(), Some(0));

        let waiting = waiters(&[70, 40, 60]);
        assert_eq!(Sstf.select_next(&waiting, 50).unwrap(), Some(2));
    }

    #[test]
    fn test_sstf_choice_is_minimal() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..5000 {
            // Narrow track range so equal distances are common
            let len = rng.gen_range(1..16);
            let tracks: Vec<u32> = (0..len).map(|_| rng.gen_range(0..60)).collect();
            let position = rng.gen_range(0..60);
            let chosen = Sstf.select_next(&waiters(&tracks), position).unwrap();

            let best = tracks.iter().map(|t| t.abs_diff(position)).min().unwrap();
            let earliest_best = tracks.iter().position(|t| t.abs_diff(position) == best);
            assert_eq!(chosen, earliest_best, "tracks {tracks:?} at {position}");
        }
    }

    #[test]
    fn test_scan_sweeps_then_reverses() {
        let mut scan = Scan::new(Direction::Forward);
        let order = admission_order(&mut scan, waiters(&[10, 30, 70, 90]), 50);
        assert_eq!(order, vec![70, 90, 30, 10]);
        assert_eq!(scan.flips, 1);
        assert_eq!(scan.direction(), Some(Direction::Backward));
    }

    #[test]
    fn test_scan_backward_sweep() {
        let mut scan = Scan::new(Direction::Backward);
        let order = admission_order(&mut scan, waiters(&[10, 30, 70, 90]), 50);
        assert_eq!(order, vec![30, 10, 70, 90]);
        assert_eq!(scan.direction(), Some(Direction::Forward));
    }

    #[test]
    fn test_scan_track_at_arm_counts_as_ahead() {
        let mut scan = Scan::new(Direction::Backward);
        let waiting = waiters(&[80, 50]);
        assert_eq!(scan.select_next(&waiting, 50).unwrap(), Some(1));
        assert_eq!(scan.flips, 0);
    }

    #[test]
    fn test_scan_no_flip_while_requests_ahead() {
        let mut scan = Scan::new(Direction::Forward);
        let waiting = waiters(&[0, 1, 2, 99]);
        assert_eq!(scan.select_next(&waiting, 98).unwrap(), Some(3));
        assert_eq!(scan.direction(), Some(Direction::Forward));
    }

    #[test]
    fn test_scan_priority_orders_ahead_first() {
        assert!(scan_priority(99, 50, Direction::Forward) < scan_priority(49, 50, Direction::Forward));
        assert!(scan_priority(0, 50, Direction::Backward) < scan_priority(51, 50, Direction::Backward));
        assert_eq!(scan_priority(50, 50, Direction::Forward), (false, 0));
    }

    #[test]
    fn test_scan_formulations_agree() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let len = rng.gen_range(1..12);
            let tracks: Vec<u32> = (0..len).map(|_| rng.gen_range(0..400)).collect();
            let position = rng.gen_range(0..400);
            let direction = if rng.gen_bool(0.5) {
                Direction::Forward
            } else {
                Direction::Backward
            };
            let waiting = waiters(&tracks);

            let mut by_predicate = Scan::new(direction);
            let mut by_priority = Scan::new(direction);
            let a = by_predicate.select_next(&waiting, position).unwrap();
            let b = by_priority.select_by_priority(&waiting, position);

            assert_eq!(a, b, "tracks {tracks:?} at {position} going {direction:?}");
            assert_eq!(by_predicate.direction(), by_priority.direction());
        }
    }

    #[test]
    fn test_scan_choice_is_nearest_in_sweep() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..5000 {
            let len = rng.gen_range(1..16);
            let tracks: Vec<u32> = (0..len).map(|_| rng.gen_range(0..60)).collect();
            let position = rng.gen_range(0..60);
            let direction = if rng.gen_bool(0.5) {
                Direction::Forward
            } else {
                Direction::Backward
            };
            let mut scan = Scan::new(direction);
            let chosen = scan.select_next(&waiters(&tracks), position).unwrap().unwrap();

            // Keep the direction while anything lies ahead, else reverse
            let any_ahead = tracks.iter().any(|&t| direction.is_ahead(t, position));
            let expected_direction = if any_ahead { direction } else { direction.flipped() };
            let expected = (0..len)
                .filter(|&i| expected_direction.is_ahead(tracks[i], position))
                .min_by_key(|&i| (tracks[i].abs_diff(position), i));

            assert_eq!(Some(chosen), expected, "tracks {tracks:?} at {position} going {direction:?}");
            assert_eq!(scan.direction(), Some(expected_direction));
            assert_eq!(scan.flips, usize::from(!any_ahead));
        }
    }

    #[test]
    fn test_algorithm_builds_matching_discipline() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.discipline().name(), algorithm.name());
        }
        assert_eq!(Algorithm::Scan.discipline().direction(), Some(Direction::Forward));
        assert_eq!(Algorithm::Fcfs.discipline().direction(), None);
    }
}
