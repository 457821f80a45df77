use std::collections::HashSet;
use std::fmt;

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind, Users};

use crate::monitor::record::UNNAMED;

/// Why a single per-process fetch failed. The sampler matches on this to
/// decide skip-vs-degrade; enumeration failures surface as a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Process exited between enumeration and the stat fetch.
    Vanished,
    /// The stat exists but we are not allowed to read it.
    PermissionDenied,
    /// Anything else transient.
    Other(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Vanished => write!(f, "process vanished"),
            SourceError::PermissionDenied => write!(f, "permission denied"),
            SourceError::Other(reason) => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Enumeration result: identity plus the fields that come for free with it.
#[derive(Debug, Clone)]
pub struct ProcessMeta {
    pub pid: u32,
    /// Seconds since the epoch at which the process started. Together with
    /// the pid this identifies a process across cycles.
    pub start_time: u64,
    pub name: String,
    pub owner: Option<String>,
}

/// The OS process table, reduced to what the sampler consumes.
///
/// Production code uses [`SystemSource`]; engine tests drive a fake through
/// the same seam. Every accessor is individually fallible so the sampler can
/// skip one process without losing the cycle.
pub trait SnapshotSource {
    /// Refresh the underlying tables and list all live processes.
    fn processes(&mut self) -> Result<Vec<ProcessMeta>, SourceError>;
    fn cpu_percent(&self, pid: u32) -> Result<f32, SourceError>;
    fn memory_rss(&self, pid: u32) -> Result<u64, SourceError>;
    /// Cumulative (read_bytes, write_bytes) since process start.
    fn io_counters(&self, pid: u32) -> Result<(u64, u64), SourceError>;
    /// Number of open inet sockets owned by the process.
    fn socket_count(&self, pid: u32) -> Result<usize, SourceError>;
}

/// Live process table backed by sysinfo, with inet socket counts joined in
/// from the proc filesystem.
pub struct SystemSource {
    sys: System,
    users: Users,
    inet_inodes: HashSet<u64>,
}

impl SystemSource {
    pub fn new() -> Self {
        Self {
            sys: System::new(),
            users: Users::new_with_refreshed_list(),
            inet_inodes: HashSet::new(),
        }
    }

    fn proc(&self, pid: u32) -> Result<&sysinfo::Process, SourceError> {
        self.sys
            .process(sysinfo::Pid::from_u32(pid))
            .ok_or(SourceError::Vanished)
    }

    /// Socket inodes of every inet socket on the host, rebuilt once per
    /// enumeration and joined against each process's fd table in
    /// [`SnapshotSource::socket_count`].
    fn refresh_inet_inodes(&mut self) {
        self.inet_inodes.clear();
        for table in [procfs::net::tcp(), procfs::net::tcp6()] {
            if let Ok(entries) = table {
                self.inet_inodes.extend(entries.into_iter().map(|e| e.inode));
            }
        }
        for table in [procfs::net::udp(), procfs::net::udp6()] {
            if let Ok(entries) = table {
                self.inet_inodes.extend(entries.into_iter().map(|e| e.inode));
            }
        }
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSource for SystemSource {
    fn processes(&mut self) -> Result<Vec<ProcessMeta>, SourceError> {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_memory()
                .with_disk_usage()
                .with_user(UpdateKind::OnlyIfNotSet),
        );
        self.refresh_inet_inodes();
        let mut metas: Vec<ProcessMeta> = self
            .sys
            .processes()
            .iter()
            .map(|(pid, proc)| {
                let name = proc.name().to_string_lossy();
                ProcessMeta {
                    pid: pid.as_u32(),
                    start_time: proc.start_time(),
                    name: if name.is_empty() {
                        UNNAMED.to_string()
                    } else {
                        name.into_owned()
                    },
                    owner: proc
                        .user_id()
                        .and_then(|uid| self.users.get_user_by_id(uid))
                        .map(|user| user.name().to_string()),
                }
            })
            .collect();
        // sysinfo hands the table back as a map; pid order makes the
        // enumeration (and therefore sort-tie order) deterministic.
        metas.sort_unstable_by_key(|meta| meta.pid);
        Ok(metas)
    }

    fn cpu_percent(&self, pid: u32) -> Result<f32, SourceError> {
        Ok(self.proc(pid)?.cpu_usage())
    }

    fn memory_rss(&self, pid: u32) -> Result<u64, SourceError> {
        Ok(self.proc(pid)?.memory())
    }

    fn io_counters(&self, pid: u32) -> Result<(u64, u64), SourceError> {
        let usage = self.proc(pid)?.disk_usage();
        Ok((usage.total_read_bytes, usage.total_written_bytes))
    }

    fn socket_count(&self, pid: u32) -> Result<usize, SourceError> {
        let proc = procfs::process::Process::new(pid as i32).map_err(proc_error)?;
        let mut count = 0;
        for fd in proc.fd().map_err(proc_error)? {
            let fd = fd.map_err(proc_error)?;
            if let procfs::process::FDTarget::Socket(inode) = fd.target
                && self.inet_inodes.contains(&inode)
            {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn proc_error(err: procfs::ProcError) -> SourceError {
    match err {
        procfs::ProcError::NotFound(_) => SourceError::Vanished,
        procfs::ProcError::PermissionDenied(_) => SourceError::PermissionDenied,
        other => SourceError::Other(other.to_string()),
    }
}

/// Scripted process table for engine tests.
#[cfg(test)]
pub mod fake {
    use std::collections::HashMap;

    use super::{ProcessMeta, SnapshotSource, SourceError};

    #[derive(Debug, Clone)]
    pub struct FakeProc {
        pub meta: ProcessMeta,
        pub cpu: Result<f32, SourceError>,
        pub memory: Result<u64, SourceError>,
        pub io: Result<(u64, u64), SourceError>,
        pub sockets: Result<usize, SourceError>,
    }

    impl FakeProc {
        pub fn new(pid: u32, name: &str, owner: Option<&str>) -> Self {
            Self {
                meta: ProcessMeta {
                    pid,
                    start_time: 1000,
                    name: name.to_string(),
                    owner: owner.map(str::to_string),
                },
                cpu: Ok(0.0),
                memory: Ok(0),
                io: Ok((0, 0)),
                sockets: Ok(0),
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct FakeSource {
        pub procs: Vec<FakeProc>,
        by_pid: HashMap<u32, usize>,
    }

    impl FakeSource {
        pub fn new(procs: Vec<FakeProc>) -> Self {
            let by_pid = procs
                .iter()
                .enumerate()
                .map(|(index, p)| (p.meta.pid, index))
                .collect();
            Self { procs, by_pid }
        }

        fn find(&self, pid: u32) -> Result<&FakeProc, SourceError> {
            self.by_pid
                .get(&pid)
                .map(|&index| &self.procs[index])
                .ok_or(SourceError::Vanished)
        }
    }

    impl SnapshotSource for FakeSource {
        fn processes(&mut self) -> Result<Vec<ProcessMeta>, SourceError> {
            Ok(self.procs.iter().map(|p| p.meta.clone()).collect())
        }

        fn cpu_percent(&self, pid: u32) -> Result<f32, SourceError> {
            self.find(pid)?.cpu.clone()
        }

        fn memory_rss(&self, pid: u32) -> Result<u64, SourceError> {
            self.find(pid)?.memory.clone()
        }

        fn io_counters(&self, pid: u32) -> Result<(u64, u64), SourceError> {
            self.find(pid)?.io.clone()
        }

        fn socket_count(&self, pid: u32) -> Result<usize, SourceError> {
            self.find(pid)?.sockets.clone()
        }
    }
}
