//! Process memory probe

use sysinfo::{get_current_pid, Pid, ProcessesToUpdate, System};
use tracing::warn;

/// Samples this process's resident memory on demand.
pub struct MemoryProbe {
    system: System,
    pid: Option<Pid>,
}

impl MemoryProbe {
    pub fn new() -> Self {
        let pid = match get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!(error = e, "Cannot resolve own pid; memory reports 0");
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }

    /// Resident memory in megabytes, 0.0 when the platform cannot
    /// report it.
    pub fn usage_mb(&mut self) -> f64 {
        let Some(pid) = self.pid else {
            return 0.0;
        };
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]));
        self.system
            .process(pid)
            .map(|process| process.memory() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0)
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}
