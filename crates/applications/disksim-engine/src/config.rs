//! Simulation configuration
//!
//! All times are in milliseconds. Values outside their domain are rejected by
//! [`SimConfig::validate`] before a run starts, never discovered mid-run.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rand_distr::Exp;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Default number of requests the controller generates per run
pub const DEFAULT_REQUEST_COUNT: usize = 1000;

/// Default virtual-time ceiling (ms)
pub const DEFAULT_MAX_VIRTUAL_TIME: f64 = 1_000_000.0;

/// Exponential read lengths stay below this many means in practice; the
/// validation bound for derived service times uses it as the longest read
const READ_LENGTH_TAIL: f64 = 64.0;

/// Head scheduling algorithm
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    /// First-come-first-served
    #[value(name = "FCFS", alias = "fcfs")]
    Fcfs,

    /// Shortest-seek-time-first
    #[serde(alias = "SSF")]
    #[value(name = "SSTF", aliases = ["sstf", "SSF", "ssf"])]
    Sstf,

    /// Elevator
    #[default]
    #[serde(alias = "ELEVATOR")]
    #[value(name = "SCAN", aliases = ["scan", "ELEVATOR", "elevator"])]
    Scan,
}

impl Algorithm {
    /// Every algorithm, in comparison-table order
    pub const ALL: [Algorithm; 3] = [Algorithm::Fcfs, Algorithm::Sstf, Algorithm::Scan];

    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Fcfs => "FCFS",
            Algorithm::Sstf => "SSTF",
            Algorithm::Scan => "SCAN",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FCFS" => Ok(Algorithm::Fcfs),
            "SSTF" | "SSF" => Ok(Algorithm::Sstf),
            "SCAN" | "ELEVATOR" => Ok(Algorithm::Scan),
            other => Err(SimError::config(format!(
                "unknown algorithm '{other}' (expected FCFS, SSTF or SCAN)"
            ))),
        }
    }
}

/// Closed-form latency model of the disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskGeometry {
    /// Tracks are numbered `0..track_count`
    pub track_count: u32,

    /// Arm travel time per track crossed (ms)
    pub seek_time_per_track: f64,

    /// Sectors per track, used in the rotational latency formula
    pub sectors: u32,

    /// Bytes transferred per unit of read length
    pub bytes_per_sec: f64,

    /// Mean of the exponential read-length distribution
    pub mean_read_length: f64,
}

impl Default for DiskGeometry {
    fn default() -> Self {
        DiskGeometry {
            track_count: 100,
            seek_time_per_track: 0.4,
            sectors: 128,
            bytes_per_sec: 256.0,
            mean_read_length: 4.0,
        }
    }
}

impl DiskGeometry {
    /// Seek time for an arm movement of `distance` tracks
    pub fn seek_time(&self, distance: u32) -> f64 {
        distance as f64 * self.seek_time_per_track
    }

    /// Rotational latency for a read of `read_length` at `disk_rpm`
    pub fn rotational_time(&self, disk_rpm: u32, read_length: f64) -> f64 {
        (self.sectors as f64 / disk_rpm as f64) * read_length
    }

    fn validate(&self) -> Result<()> {
        if self.track_count == 0 {
            return Err(SimError::config("track_count must be positive"));
        }
        if self.sectors == 0 {
            return Err(SimError::config("sectors must be positive"));
        }
        positive("seek_time_per_track", self.seek_time_per_track)?;
        positive("bytes_per_sec", self.bytes_per_sec)?;
        positive("mean_read_length", self.mean_read_length)?;
        Ok(())
    }
}

/// Parameters for one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub algorithm: Algorithm,

    /// Expected gap between arrivals (ms); gaps are uniform on [0, 2 * mean)
    pub mean_inter_arrival: f64,

    pub disk_rpm: u32,

    pub request_count: usize,

    /// Run stops here even if requests remain unserved
    pub max_virtual_time: f64,

    /// Random seed; `None` draws one from OS entropy
    pub seed: Option<u64>,

    pub geometry: DiskGeometry,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            algorithm: Algorithm::default(),
            mean_inter_arrival: 150.0,
            disk_rpm: 7200,
            request_count: DEFAULT_REQUEST_COUNT,
            max_virtual_time: DEFAULT_MAX_VIRTUAL_TIME,
            seed: None,
            geometry: DiskGeometry::default(),
        }
    }
}

impl SimConfig {
    /// Create a config with default disk geometry
    pub fn new(algorithm: Algorithm, mean_inter_arrival: f64, disk_rpm: u32) -> Self {
        SimConfig {
            algorithm,
            mean_inter_arrival,
            disk_rpm,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_request_count(mut self, count: usize) -> Self {
        self.request_count = count;
        self
    }

    pub fn with_max_virtual_time(mut self, max_virtual_time: f64) -> Self {
        self.max_virtual_time = max_virtual_time;
        self
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Reject parameters outside their domain
    pub fn validate(&self) -> Result<()> {
        positive("mean_inter_arrival", self.mean_inter_arrival)?;
        if self.disk_rpm == 0 {
            return Err(SimError::config("disk_rpm must be positive"));
        }
        if self.request_count == 0 {
            return Err(SimError::config("request_count must be positive"));
        }
        positive("max_virtual_time", self.max_virtual_time)?;
        self.geometry.validate()?;

        // Values derived during the run must stay finite as well
        let longest_gap = self.mean_inter_arrival * 2.0;
        finite("2 * mean_inter_arrival", longest_gap)?;
        let longest_read = self.geometry.mean_read_length * READ_LENGTH_TAIL;
        self.check_read_length(longest_read)?;
        finite(
            "total bytes read",
            longest_read * self.geometry.bytes_per_sec * self.request_count as f64,
        )
    }

    /// Reject a read length whose service time or byte count would overflow
    pub fn check_read_length(&self, read_length: f64) -> Result<()> {
        let geometry = &self.geometry;
        let seek_time = geometry.seek_time(geometry.track_count.saturating_sub(1));
        let rotational_time = geometry.rotational_time(self.disk_rpm, read_length);
        finite("longest seek time", seek_time)?;
        finite("rotational latency", rotational_time)?;
        finite("access time", seek_time + rotational_time)?;
        finite("bytes read", read_length * geometry.bytes_per_sec)
    }

    /// Read-length distribution for sampled requests. Call after [`validate`](Self::validate).
    pub fn read_length_distribution(&self) -> Result<Exp<f64>> {
        Exp::new(1.0 / self.geometry.mean_read_length)
            .map_err(|e| SimError::config(format!("read length distribution: {e}")))
    }
}

fn positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimError::config(format!(
            "{field} must be a positive finite number, got {value}"
        )))
    }
}

fn finite(what: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::config(format!("{what} overflows ({value})")))
    }
}
