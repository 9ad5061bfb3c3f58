use sysinfo::{MemoryRefreshKind, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub total_mb: u64,
    pub used_mb: u64,
    pub avail_mb: u64,
    /// Resident size of this process; 0 when it cannot be read.
    pub process_mb: u64,
}

impl MemoryStats {
    pub fn summary(&self) -> String {
        format!("mem {} MB (system {}/{} MB free)", self.process_mb, self.avail_mb, self.total_mb)
    }
}

pub fn memory_stats_mb() -> MemoryStats {
    let mut sys = System::new_with_specifics(RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()));
    sys.refresh_memory();
    // bytes in sysinfo 0.37
    let total_mb = sys.total_memory() / (1024 * 1024);
    let avail_mb = sys.available_memory() / (1024 * 1024);
    let used_mb = total_mb.saturating_sub(avail_mb);

    let process_mb = match sysinfo::get_current_pid() {
        Ok(pid) => {
            sys.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), false, ProcessRefreshKind::nothing().with_memory());
            sys.process(pid).map(|p| p.memory() / (1024 * 1024)).unwrap_or(0)
        }
        Err(_) => 0,
    };
    MemoryStats { total_mb, used_mb, avail_mb, process_mb }
}

/// Logs memory after a heavy step such as loading a workbook.
pub fn log_memory(stage: &str) {
    let m = memory_stats_mb();
    log::debug!("[MEM] {}: {}", stage, m.summary());
}
