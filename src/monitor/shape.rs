use std::cmp::Ordering;

use crate::monitor::record::ProcessRecord;

/// Sort order for the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Cpu,
    Memory,
    Pid,
    Name,
}

impl SortKey {
    /// Parse a config value. Unrecognized names sort by process name.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "cpu" => SortKey::Cpu,
            "memory" | "mem" => SortKey::Memory,
            "pid" => SortKey::Pid,
            _ => SortKey::Name,
        }
    }

    /// Cycle to the next sort option.
    pub fn next(self) -> Self {
        match self {
            SortKey::Cpu => SortKey::Memory,
            SortKey::Memory => SortKey::Pid,
            SortKey::Pid => SortKey::Name,
            SortKey::Name => SortKey::Cpu,
        }
    }

    /// Get display name for the sort key
    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Cpu => "CPU%",
            SortKey::Memory => "Mem",
            SortKey::Pid => "PID",
            SortKey::Name => "Name",
        }
    }

    fn comparator(self) -> fn(&ProcessRecord, &ProcessRecord) -> Ordering {
        match self {
            SortKey::Cpu => by_cpu_desc,
            SortKey::Memory => by_memory_desc,
            SortKey::Pid => by_pid,
            SortKey::Name => by_name,
        }
    }
}

fn by_cpu_desc(a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
    b.cpu_percent.total_cmp(&a.cpu_percent)
}

fn by_memory_desc(a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
    b.memory_mb.total_cmp(&a.memory_mb)
}

fn by_pid(a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
    a.pid.cmp(&b.pid)
}

fn by_name(a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

/// Apply the search query and sort key to one cycle's records.
///
/// The query matches case-insensitively against the name, or as a substring
/// of the decimal pid. An empty or whitespace query passes everything. The
/// sort is stable: ties keep enumeration order.
pub fn shape(records: &[ProcessRecord], query: &str, sort_key: SortKey) -> Vec<ProcessRecord> {
    let needle = query.trim().to_lowercase();
    let mut shaped: Vec<ProcessRecord> = records
        .iter()
        .filter(|record| {
            needle.is_empty()
                || record.name.to_lowercase().contains(&needle)
                || record.pid.to_string().contains(&needle)
        })
        .cloned()
        .collect();
    shaped.sort_by(|a, b| sort_key.comparator()(a, b));
    shaped
}
