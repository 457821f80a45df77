use chrono::{DateTime, Local};

/// Fallback display name for processes the OS reports without one.
pub const UNNAMED: &str = "<unnamed>";

/// One row of the process table, rebuilt from scratch every sampling cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub io_rate_kbs: f64,
    pub connection_count: usize,
    /// `None` for kernel threads and other processes with no resolvable user.
    pub owner: Option<String>,
}

/// A completed sampling cycle, published to the presentation layer as one
/// unit. Never contains a partially sampled process table.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub records: Vec<ProcessRecord>,
    pub taken_at: DateTime<Local>,
}

impl Snapshot {
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

/// Round to one decimal place, half away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round1_keeps_one_decimal() {
        assert_eq!(round1(12.34), 12.3);
        assert_eq!(round1(12.36), 12.4);
        assert_eq!(round1(0.0), 0.0);
    }

    #[test]
    fn round1_half_goes_away_from_zero() {
        // Exactly representable halves only; x.x5 literals are not.
        assert_eq!(round1(0.25), 0.3);
        assert_eq!(round1(0.75), 0.8);
        assert_eq!(round1(-0.25), -0.3);
    }
}
