//! Pid-keyed views onto live OS processes.
//!
//! A [`ProcessHandle`] owns nothing but a pid. Every query resolves the
//! process again, so a handle can outlive the process it points to: once the
//! pid is gone, measurements fail with [`BenchError::ProcessNotFound`].

use crate::error::{BenchError, Result};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[cfg(target_os = "linux")]
use once_cell::sync::Lazy;

#[cfg(target_os = "linux")]
static TICKS_PER_SECOND: Lazy<f64> = Lazy::new(|| procfs::ticks_per_second() as f64);

/// Cumulative CPU times of a process, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuTimes {
    pub user: f64,
    pub system: f64,
    /// Time spent by children that have been waited for
    pub children_user: f64,
    pub children_system: f64,
}

impl CpuTimes {
    /// CPU time spent by the process itself
    pub fn busy(&self) -> f64 {
        self.user + self.system
    }
}

/// What a sampler needs to know about the process it watches.
///
/// Implemented by [`ProcessHandle`] for real processes; tests implement it
/// over synthetic process trees.
pub trait MonitoredProcess: Clone + Send + Sync + 'static {
    fn pid(&self) -> u32;

    /// `false` once the process exited, including while it is a zombie
    fn is_running(&self) -> bool;

    fn cpu_times(&self) -> Result<CpuTimes>;

    /// Resident set size in bytes
    fn memory_rss(&self) -> Result<u64>;

    /// Direct children, ordered by pid
    fn children(&self) -> Result<Vec<Self>>;

    /// Every running descendant. A process that is not running is skipped
    /// together with its subtree, and no pid is visited twice.
    fn descendants(&self) -> Result<Vec<Self>> {
        let mut visited = HashSet::from([self.pid()]);
        let mut stack = self.children()?;
        let mut found = Vec::new();

        while let Some(process) = stack.pop() {
            if !visited.insert(process.pid()) || !process.is_running() {
                continue;
            }
            stack.extend(process.children().unwrap_or_default());
            found.push(process);
        }

        Ok(found)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle {
    pid: Pid,
}

impl ProcessHandle {
    pub fn new(pid: u32) -> Self {
        Self {
            pid: Pid::from_u32(pid),
        }
    }

    /// Handle on the calling process
    pub fn current() -> Self {
        Self::new(std::process::id())
    }

    fn not_found(&self) -> BenchError {
        BenchError::ProcessNotFound(self.pid.as_u32())
    }

    fn refresh(&self, kind: ProcessRefreshKind) -> System {
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&[self.pid]), true, kind);
        system
    }

    /// Parent to children over a fresh snapshot of the whole process table
    fn children_map(&self) -> Result<HashMap<Pid, Vec<ProcessHandle>>> {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );

        if system.process(self.pid).is_none() {
            return Err(self.not_found());
        }

        let mut children: HashMap<Pid, Vec<ProcessHandle>> = HashMap::new();
        // Threads show up as processes on Linux; only keep real children
        for process in system
            .processes()
            .values()
            .filter(|process| process.thread_kind().is_none())
        {
            if let Some(parent) = process.parent() {
                children.entry(parent).or_default().push(ProcessHandle {
                    pid: process.pid(),
                });
            }
        }

        Ok(children)
    }

    #[cfg(target_os = "linux")]
    fn proc_stat(&self) -> Result<procfs::process::Stat> {
        let pid = self.pid.as_u32() as i32;
        procfs::process::Process::new(pid)
            .and_then(|process| process.stat())
            .map_err(|err| match err {
                procfs::ProcError::NotFound(_) => self.not_found(),
                other => BenchError::Io(std::io::Error::other(other.to_string())),
            })
    }
}

impl MonitoredProcess for ProcessHandle {
    fn pid(&self) -> u32 {
        self.pid.as_u32()
    }

    fn is_running(&self) -> bool {
        #[cfg(target_os = "linux")]
        {
            // 'Z' zombie, 'X' dead
            match self.proc_stat() {
                Ok(stat) => !matches!(stat.state, 'Z' | 'X'),
                Err(_) => false,
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            use sysinfo::ProcessStatus;

            let system = self.refresh(ProcessRefreshKind::nothing());
            match system.process(self.pid) {
                Some(process) => !matches!(
                    process.status(),
                    ProcessStatus::Zombie | ProcessStatus::Dead
                ),
                None => false,
            }
        }
    }

    fn cpu_times(&self) -> Result<CpuTimes> {
        #[cfg(target_os = "linux")]
        {
            let stat = self.proc_stat()?;
            let ticks = *TICKS_PER_SECOND;
            Ok(CpuTimes {
                user: stat.utime as f64 / ticks,
                system: stat.stime as f64 / ticks,
                children_user: stat.cutime.max(0) as f64 / ticks,
                children_system: stat.cstime.max(0) as f64 / ticks,
            })
        }

        #[cfg(not(target_os = "linux"))]
        {
            // sysinfo only exposes a combined user+system counter here
            let system = self.refresh(ProcessRefreshKind::nothing().with_cpu());
            let process = system.process(self.pid).ok_or_else(|| self.not_found())?;
            Ok(CpuTimes {
                user: process.accumulated_cpu_time() as f64 / 1000.0,
                ..CpuTimes::default()
            })
        }
    }

    fn memory_rss(&self) -> Result<u64> {
        let system = self.refresh(ProcessRefreshKind::nothing().with_memory());
        system
            .process(self.pid)
            .map(|process| process.memory())
            .ok_or_else(|| self.not_found())
    }

    fn children(&self) -> Result<Vec<Self>> {
        let mut children = self.children_map()?.remove(&self.pid).unwrap_or_default();
        children.sort_by_key(|child| child.pid.as_u32());
        Ok(children)
    }

    /// Walks one snapshot of the process table instead of resolving the
    /// children of every node separately
    fn descendants(&self) -> Result<Vec<Self>> {
        let mut children = self.children_map()?;
        let mut visited = HashSet::from([self.pid]);
        let mut stack = children.remove(&self.pid).unwrap_or_default();
        let mut found = Vec::new();

        while let Some(process) = stack.pop() {
            if !visited.insert(process.pid) || !process.is_running() {
                continue;
            }
            stack.extend(children.remove(&process.pid).unwrap_or_default());
            found.push(process);
        }

        found.sort_by_key(|process| process.pid.as_u32());
        Ok(found)
    }
}
