//! Discrete-event driver for the disk simulation
//!
//! One [`Simulation`] is one run: a controller, a head and a fixed set of
//! monitors. The driver pops events off the clock, resumes the owning
//! process and carries out the step it returns. Requests admitted by a
//! release are resumed through a zero-delay event, so same-instant work is
//! dispatched in submission order and a fixed seed reproduces a run exactly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Exp;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::clock::{ProcessId, SimulationClock};
use crate::config::{Algorithm, SimConfig};
use crate::discipline::Direction;
use crate::error::{Result, SimError};
use crate::head::{Admission, DiskHead};
use crate::monitor::Monitor;
use crate::process::{
    ArrivalSource, Controller, Process, ProcessContext, ScriptedRequest, Step, Wake,
};

/// Timing of one serviced request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: u64,
    pub track: u32,
    pub from_position: u32,
    /// Sweep direction at admission (SCAN only)
    pub direction: Option<Direction>,
    /// Admitted from the waiting set, not straight onto a free head
    pub queued: bool,
    pub arrival_time: f64,
    pub admit_time: f64,
    pub completion_time: f64,
    pub read_length: f64,
    pub seek_time: f64,
    pub rotational_time: f64,
    pub access_time: f64,
    pub bytes: f64,
}

impl RequestRecord {
    /// Time spent in the waiting set
    pub fn wait_time(&self) -> f64 {
        self.admit_time - self.arrival_time
    }
}

/// Monitors and counters filled in during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub seek: Monitor,
    pub rotation: Monitor,
    pub access: Monitor,
    pub movement: Monitor,
    pub bytes: Monitor,
    pub records: Vec<RequestRecord>,
    pub generated: usize,
    pub completed: usize,
}

impl Default for RunStats {
    fn default() -> Self {
        RunStats {
            seek: Monitor::new("Seek time"),
            rotation: Monitor::new("Rotational latency"),
            access: Monitor::new("Access time (seek + rotation)"),
            movement: Monitor::new("Disk arm movement"),
            bytes: Monitor::new("Bytes read"),
            records: Vec::new(),
            generated: 0,
            completed: 0,
        }
    }
}

impl RunStats {
    pub fn monitors(&self) -> [&Monitor; 5] {
        [
            &self.seek,
            &self.rotation,
            &self.access,
            &self.movement,
            &self.bytes,
        ]
    }
}

/// Count, mean and total of one monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub total: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl From<&Monitor> for MonitorSummary {
    fn from(monitor: &Monitor) -> Self {
        MonitorSummary {
            name: monitor.name().to_string(),
            count: monitor.count(),
            mean: monitor.mean_or_zero(),
            total: monitor.total(),
            min: monitor.min(),
            max: monitor.max(),
        }
    }
}

/// Result of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub algorithm: Algorithm,
    pub mean_inter_arrival: f64,
    pub disk_rpm: u32,
    pub seed: Option<u64>,
    pub generated_requests: usize,
    pub completed_requests: usize,
    pub unserved_requests: usize,
    pub elapsed_time: f64,
    pub average_seek_time: f64,
    pub average_rotational_latency: f64,
    pub average_access_time: f64,
    pub average_wait_time: f64,
    pub max_wait_time: f64,
    pub total_access_time: f64,
    pub total_arm_movement: f64,
    pub total_bytes: f64,
    pub throughput: f64,
    pub average_queue_length: f64,
    pub monitors: Vec<MonitorSummary>,
    pub records: Vec<RequestRecord>,
    #[serde(skip)]
    pub stats: RunStats,
    #[serde(skip)]
    pub queue_length: Monitor,
}

/// A single simulation run
pub struct Simulation<R> {
    config: SimConfig,
    clock: SimulationClock<Wake>,
    head: DiskHead,
    processes: Vec<Option<Process>>,
    rng: R,
    read_length: Exp<f64>,
    stats: RunStats,
    expected_requests: usize,
}

impl Simulation<StdRng> {
    /// Random arrivals seeded from `config.seed`, or from OS entropy when unset
    pub fn from_config(config: SimConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(config, rng)
    }
}

impl<R: Rng> Simulation<R> {
    /// Controller generating `config.request_count` random arrivals
    pub fn new(config: SimConfig, rng: R) -> Result<Self> {
        config.validate()?;
        let source = ArrivalSource::random(config.mean_inter_arrival, config.request_count);
        Self::with_source(config, rng, source)
    }

    /// Controller replaying a fixed list of arrivals
    pub fn with_arrivals(config: SimConfig, rng: R, arrivals: Vec<ScriptedRequest>) -> Result<Self> {
        config.validate()?;
        for arrival in &arrivals {
            config.check_read_length(arrival.read_length)?;
        }
        let source = ArrivalSource::scripted(arrivals)?;
        Self::with_source(config, rng, source)
    }

    fn with_source(config: SimConfig, rng: R, source: ArrivalSource) -> Result<Self> {
        let read_length = config.read_length_distribution()?;
        let head = DiskHead::new(config.algorithm.discipline(), 0);
        let mut simulation = Simulation {
            expected_requests: source.len(),
            config,
            clock: SimulationClock::new(),
            head,
            processes: Vec::new(),
            rng,
            read_length,
            stats: RunStats::default(),
        };
        let controller = simulation.register(Process::Controller(Controller::new(source)));
        simulation.clock.schedule(controller, 0.0, Wake::Start)?;
        Ok(simulation)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn head(&self) -> &DiskHead {
        &self.head
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Run until no events remain or the next one lies past `max_virtual_time`
    pub fn run(mut self) -> Result<SimulationResult> {
        info!(
            algorithm = %self.config.algorithm,
            mean_inter_arrival = self.config.mean_inter_arrival,
            disk_rpm = self.config.disk_rpm,
            requests = self.expected_requests,
            "starting simulation"
        );

        while let Some(event) = self.clock.next_until(self.config.max_virtual_time) {
            trace!(
                time = event.time,
                seq = event.seq(),
                process = %event.process,
                wake = ?event.payload,
                "dispatch"
            );
            self.resume(event.process, event.payload)?;
        }

        let result = self.collect_results();
        if result.unserved_requests > 0 {
            warn!(
                unserved = result.unserved_requests,
                max_virtual_time = self.config.max_virtual_time,
                "simulation stopped at the time ceiling with requests unserved"
            );
        }
        info!(
            algorithm = %result.algorithm,
            elapsed = result.elapsed_time,
            completed = result.completed_requests,
            "simulation finished"
        );
        Ok(result)
    }

    fn register(&mut self, process: Process) -> ProcessId {
        let id = ProcessId(self.processes.len());
        self.processes.push(Some(process));
        id
    }

    /// Resume `pid` and keep stepping it until it suspends or finishes
    fn resume(&mut self, pid: ProcessId, mut wake: Wake) -> Result<()> {
        let mut process = self
            .processes
            .get_mut(pid.0)
            .and_then(Option::take)
            .ok_or_else(|| SimError::invariant(format!("{pid} resumed but is not runnable")))?;

        loop {
            let now = self.clock.now();
            let step = {
                let mut ctx = ProcessContext {
                    now,
                    rng: &mut self.rng,
                    config: &self.config,
                    read_length: &self.read_length,
                    stats: &mut self.stats,
                };
                process.step(wake, &mut ctx)?
            };

            match step {
                Step::Hold(duration) => {
                    self.clock.schedule(pid, duration, Wake::Timer)?;
                    break;
                }
                Step::Acquire { track } => match self.head.acquire(pid, track, now)? {
                    Some(admission) => {
                        self.log_admission(&process, &admission);
                        wake = Wake::Admitted(admission);
                    }
                    None => break,
                },
                Step::Release => {
                    if let Some(next) = self.head.release(pid, now)? {
                        if let Some(Some(waiter)) = self.processes.get(next.process.0) {
                            self.log_admission(waiter, &next);
                        }
                        self.clock.schedule(next.process, 0.0, Wake::Admitted(next))?;
                    }
                    wake = Wake::Continue;
                }
                Step::Spawn(child) => {
                    let child = self.register(child);
                    self.clock.schedule(child, 0.0, Wake::Start)?;
                    wake = Wake::Continue;
                }
                Step::Done => return Ok(()),
            }
        }

        self.processes[pid.0] = Some(process);
        Ok(())
    }

    fn log_admission(&self, process: &Process, admission: &Admission) {
        debug!(
            time = self.clock.now(),
            request = %process.name(),
            track = admission.track,
            from = admission.from_position,
            waiting = self.head.waiting().len(),
            direction = ?self.head.direction(),
            "head admitted request"
        );
    }

    fn collect_results(&self) -> SimulationResult {
        let stats = &self.stats;
        let elapsed_time = self.clock.now();
        let total_bytes = stats.bytes.total();
        let throughput = if elapsed_time > 0.0 {
            total_bytes / elapsed_time
        } else {
            0.0
        };
        let queue_length = self.head.queue_length_monitor().clone();
        let mut waits = Monitor::new("Wait time");
        for record in &stats.records {
            waits.observe(record.wait_time());
        }

        SimulationResult {
            algorithm: self.config.algorithm,
            mean_inter_arrival: self.config.mean_inter_arrival,
            disk_rpm: self.config.disk_rpm,
            seed: self.config.seed,
            generated_requests: stats.generated,
            completed_requests: stats.completed,
            unserved_requests: self.expected_requests - stats.completed,
            elapsed_time,
            average_seek_time: stats.seek.mean_or_zero(),
            average_rotational_latency: stats.rotation.mean_or_zero(),
            average_access_time: stats.access.mean_or_zero(),
            average_wait_time: waits.mean_or_zero(),
            max_wait_time: waits.max().unwrap_or(0.0),
            total_access_time: stats.access.total(),
            total_arm_movement: stats.movement.total(),
            total_bytes,
            throughput,
            average_queue_length: queue_length.time_average(elapsed_time).unwrap_or(0.0),
            monitors: stats.monitors().into_iter().map(MonitorSummary::from).collect(),
            records: stats.records.clone(),
            stats: stats.clone(),
            queue_length,
        }
    }
}
