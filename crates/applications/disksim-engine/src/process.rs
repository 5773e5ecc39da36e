//! Simulation processes as explicit state machines
//!
//! A process is resumed by the driver with a [`Wake`] and answers with the
//! next [`Step`] it wants to take. The only suspension points are timed holds
//! and waiting for the head; everything between two steps runs atomically.

use std::collections::VecDeque;

use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::head::Admission;
use crate::simulator::{RequestRecord, RunStats};

/// Why a process is being resumed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wake {
    /// First activation
    Start,
    /// A hold elapsed
    Timer,
    /// The head admitted this process
    Admitted(Admission),
    /// The previous step completed without suspending
    Continue,
}

/// What a process does next
#[derive(Debug)]
pub enum Step {
    /// Sleep for the given duration
    Hold(f64),
    /// Ask for the head, wanting this track
    Acquire { track: u32 },
    /// Give the head back
    Release,
    /// Start a new process now and keep running
    Spawn(Process),
    /// Finished
    Done,
}

/// Shared state a process may touch while it runs
pub struct ProcessContext<'a, R> {
    pub now: f64,
    pub rng: &'a mut R,
    pub config: &'a SimConfig,
    /// Distribution of sampled read lengths
    pub read_length: &'a Exp<f64>,
    pub stats: &'a mut RunStats,
}

/// A simulation entity
#[derive(Debug)]
pub enum Process {
    Controller(Controller),
    ReadRequest(ReadRequest),
}

impl Process {
    /// Resume the process and return its next step
    pub fn step<R: Rng>(&mut self, wake: Wake, ctx: &mut ProcessContext<'_, R>) -> Result<Step> {
        match self {
            Process::Controller(controller) => controller.step(wake, ctx),
            Process::ReadRequest(request) => request.step(wake, ctx),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Process::Controller(_) => "Controller".to_string(),
            Process::ReadRequest(request) => format!("Request{:03}", request.id),
        }
    }
}

/// A pre-determined arrival: absolute time, track and read length
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptedRequest {
    pub at: f64,
    pub track: u32,
    pub read_length: f64,
}

impl ScriptedRequest {
    pub fn new(at: f64, track: u32, read_length: f64) -> Self {
        ScriptedRequest {
            at,
            track,
            read_length,
        }
    }
}

/// Where the controller's arrivals come from
#[derive(Debug, Clone)]
pub enum ArrivalSource {
    /// `remaining` requests, gaps uniform on [0, 2 * mean)
    Random {
        mean_inter_arrival: f64,
        remaining: usize,
        started: bool,
    },
    /// Fixed arrivals as gaps from the previous one
    Scripted(VecDeque<(f64, ScriptedRequest)>),
}

/// Next arrival: gap from now and any preset track/read length
#[derive(Debug, Clone, Copy)]
struct Arrival {
    gap: f64,
    preset: Option<(u32, f64)>,
}

impl ArrivalSource {
    pub fn random(mean_inter_arrival: f64, count: usize) -> Self {
        ArrivalSource::Random {
            mean_inter_arrival,
            remaining: count,
            started: false,
        }
    }

    /// Arrivals must be in non-decreasing time order, starting at or after 0
    pub fn scripted(requests: Vec<ScriptedRequest>) -> Result<Self> {
        let mut last = 0.0;
        let mut queue = VecDeque::with_capacity(requests.len());
        for request in requests {
            if !request.at.is_finite() || request.at < last {
                return Err(SimError::config(format!(
                    "scripted arrival at t={} is out of order (previous t={last})",
                    request.at
                )));
            }
            if !(request.read_length.is_finite() && request.read_length >= 0.0) {
                return Err(SimError::config(format!(
                    "scripted read length {} must be non-negative",
                    request.read_length
                )));
            }
            queue.push_back((request.at - last, request));
            last = request.at;
        }
        Ok(ArrivalSource::Scripted(queue))
    }

    /// Number of arrivals this source will produce in total from now on
    pub fn len(&self) -> usize {
        match self {
            ArrivalSource::Random { remaining, .. } => *remaining,
            ArrivalSource::Scripted(queue) => queue.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next<R: Rng>(&mut self, rng: &mut R) -> Option<Arrival> {
        match self {
            ArrivalSource::Random {
                mean_inter_arrival,
                remaining,
                started,
            } => {
                if *remaining == 0 {
                    return None;
                }
                *remaining -= 1;
                // The first request arrives as soon as the controller starts
                let gap = if *started {
                    rng.gen_range(0.0..*mean_inter_arrival * 2.0)
                } else {
                    *started = true;
                    0.0
                };
                Some(Arrival { gap, preset: None })
            }
            ArrivalSource::Scripted(queue) => queue.pop_front().map(|(gap, request)| Arrival {
                gap,
                preset: Some((request.track, request.read_length)),
            }),
        }
    }
}

/// Arrival generator: spawns one read request per arrival without waiting
/// for any of them to finish
#[derive(Debug)]
pub struct Controller {
    source: ArrivalSource,
    pending: Option<Arrival>,
    next_id: u64,
}

impl Controller {
    pub fn new(source: ArrivalSource) -> Self {
        Controller {
            source,
            pending: None,
            next_id: 0,
        }
    }

    fn step<R: Rng>(&mut self, wake: Wake, ctx: &mut ProcessContext<'_, R>) -> Result<Step> {
        if wake == Wake::Timer {
            let arrival = self.pending.take().ok_or_else(|| {
                SimError::invariant("controller woke with no pending arrival")
            })?;
            return Ok(self.spawn(arrival, ctx));
        }

        let Some(arrival) = self.source.next(ctx.rng) else {
            return Ok(Step::Done);
        };
        if arrival.gap > 0.0 {
            self.pending = Some(arrival);
            Ok(Step::Hold(arrival.gap))
        } else {
            Ok(self.spawn(arrival, ctx))
        }
    }

    fn spawn<R>(&mut self, arrival: Arrival, ctx: &mut ProcessContext<'_, R>) -> Step {
        let id = self.next_id;
        self.next_id += 1;
        ctx.stats.generated += 1;
        let request = match arrival.preset {
            Some((track, read_length)) => ReadRequest::preset(id, track, read_length),
            None => ReadRequest::new(id),
        };
        Step::Spawn(Process::ReadRequest(request))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RequestState {
    Created,
    Waiting,
    InService,
    Released,
}

/// One read against the disk
#[derive(Debug)]
pub struct ReadRequest {
    pub id: u64,
    track: Option<u32>,
    read_length: Option<f64>,
    arrival_time: f64,
    state: RequestState,
}

impl ReadRequest {
    /// A request whose track and read length are sampled on activation
    pub fn new(id: u64) -> Self {
        ReadRequest {
            id,
            track: None,
            read_length: None,
            arrival_time: 0.0,
            state: RequestState::Created,
        }
    }

    /// A request with a fixed track and read length
    pub fn preset(id: u64, track: u32, read_length: f64) -> Self {
        ReadRequest {
            track: Some(track),
            read_length: Some(read_length),
            ..Self::new(id)
        }
    }

    fn step<R: Rng>(&mut self, wake: Wake, ctx: &mut ProcessContext<'_, R>) -> Result<Step> {
        match (self.state, wake) {
            (RequestState::Created, Wake::Start) => {
                let geometry = &ctx.config.geometry;
                let track = match self.track {
                    Some(track) => track,
                    None => ctx.rng.gen_range(0..geometry.track_count),
                };
                let read_length = match self.read_length {
                    Some(length) => length,
                    None => ctx.read_length.sample(ctx.rng),
                };
                self.track = Some(track);
                self.read_length = Some(read_length);
                self.arrival_time = ctx.now;
                self.state = RequestState::Waiting;
                Ok(Step::Acquire { track })
            }
            (RequestState::Waiting, Wake::Admitted(admission)) => {
                let read_length = self.read_length.unwrap_or_default();
                let record = self.service(admission, read_length, ctx);
                self.state = RequestState::InService;
                Ok(Step::Hold(record.access_time))
            }
            (RequestState::InService, Wake::Timer) => {
                self.state = RequestState::Released;
                Ok(Step::Release)
            }
            (RequestState::Released, Wake::Continue) => {
                ctx.stats.completed += 1;
                Ok(Step::Done)
            }
            (state, wake) => Err(SimError::invariant(format!(
                "Request{:03} woken by {wake:?} while {state:?}",
                self.id
            ))),
        }
    }

    /// Compute and record the service timing for an admission
    fn service<R>(
        &self,
        admission: Admission,
        read_length: f64,
        ctx: &mut ProcessContext<'_, R>,
    ) -> RequestRecord {
        let geometry = &ctx.config.geometry;
        let distance = admission.distance();
        let seek_time = geometry.seek_time(distance);
        let rotational_time = geometry.rotational_time(ctx.config.disk_rpm, read_length);
        let access_time = seek_time + rotational_time;
        let bytes = read_length * geometry.bytes_per_sec;

        let stats = &mut *ctx.stats;
        stats.seek.observe_at(seek_time, ctx.now);
        stats.rotation.observe_at(rotational_time, ctx.now);
        stats.access.observe_at(access_time, ctx.now);
        stats.movement.observe_at(distance as f64, ctx.now);
        stats.bytes.observe_at(bytes, ctx.now);

        let record = RequestRecord {
            id: self.id,
            track: admission.track,
            from_position: admission.from_position,
            direction: admission.direction,
            queued: admission.queued,
            arrival_time: self.arrival_time,
            admit_time: ctx.now,
            completion_time: ctx.now + access_time,
            read_length,
            seek_time,
            rotational_time,
            access_time,
            bytes,
        };
        stats.records.push(record.clone());
        record
    }
}
