//! DiskSim Engine
//!
//! Discrete-event simulator comparing disk head scheduling policies
//! (FCFS, SSTF and SCAN) on seek time, rotational latency, access time,
//! arm movement and throughput.
//!
//! ## Architecture
//!
//! ```text
//! Controller ──spawn──> ReadRequest ──acquire──> DiskHead ──select_next──> QueueDiscipline
//!      │                     │                      │
//!      └──── hold ───> SimulationClock <── release ─┘
//! ```
//!
//! Processes are state machines resumed by the clock; the head is the only
//! contended resource and its discipline is chosen once per run.

#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod discipline;
pub mod error;
pub mod head;
pub mod monitor;
pub mod process;
pub mod simulator;

pub use clock::{ProcessId, SimulationClock};
pub use config::{Algorithm, DiskGeometry, SimConfig};
pub use discipline::{Direction, Fcfs, QueueDiscipline, Scan, Sstf};
pub use error::{Result, SimError};
pub use head::{Admission, DiskHead};
pub use monitor::{Histogram, Monitor};
pub use process::ScriptedRequest;
pub use simulator::{MonitorSummary, RequestRecord, Simulation, SimulationResult};
