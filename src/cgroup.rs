//! Per-invocation cgroup-v1 hierarchy: creation, limit/task-membership
//! writes, and the post-run OOM readout.
//!
//! Grounded in `original_source/sandbox/cgroup.go`'s `InitCGroup` and the
//! teacher crate's `Cgroup` path-juggling (`src/cgroup.rs`), but split across
//! the four legacy hierarchies cgroup-v1 requires instead of the teacher's
//! single unified cgroup-v2 mount point.

use std::fs::{create_dir, remove_dir};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use nix::unistd::Pid;

use crate::error::SandboxError;

const CGROUP_MOUNT: &str = "/sys/fs/cgroup";
const CONTROLLERS: [&str; 4] = ["cpuset", "cpu", "pids", "memory"];

/// Kernel memory ceiling granted to every sandbox regardless of the caller's
/// requested limit: enough to cover glibc loader overhead without letting a
/// kernel-memory-hungry binary starve the host.
const KERNEL_MEMORY_LIMIT: &str = "64m";
/// Fixed PID ceiling that defeats fork bombs irrespective of the caller.
const PIDS_MAX: u32 = 64;
/// CPU bandwidth quota in microseconds per the default 100000us period.
const CPU_QUOTA_US: u32 = 10_000;

/// The four per-invocation cgroup directories, named by container id.
#[derive(Debug, Clone)]
pub struct CGroupSet {
    container_id: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OomIndicator {
    pub oom_kill: bool,
}

impl CGroupSet {
    fn controller_path(&self, controller: &str) -> PathBuf {
        Path::new(CGROUP_MOUNT)
            .join(controller)
            .join(&self.container_id)
    }

    /// Creates the four cgroup directories and populates every limit and
    /// task-membership file, in the order spec.md §4.1 requires (all
    /// attribute writes precede the `tasks`/`cgroup.procs` write that lets
    /// `pid` join, so the first process to enter is already constrained).
    ///
    /// `pid` is placed into every controller here; per spec.md §3's
    /// lifecycle note, callers place their *own* pid (before cloning) so the
    /// cloned child inherits cgroup membership automatically.
    pub fn prepare(
        pid: Pid,
        container_id: &str,
        memory_kb: u64,
        cpus: &str,
    ) -> Result<Self, SandboxError> {
        debug!(
            "preparing cgroups for container {container_id} (pid {pid}, memory {memory_kb}K, cpus {cpus})"
        );
        let set = CGroupSet {
            container_id: container_id.to_owned(),
        };

        for controller in CONTROLLERS {
            let path = set.controller_path(controller);
            create_dir(&path).map_err(|err| {
                SandboxError::setup(format!("cannot create cgroup dir {path:?}: {err}"))
            })?;
        }

        set.write_cpuset(pid, cpus)?;
        set.write_cpu(pid)?;
        set.write_pids(pid)?;
        set.write_memory(pid, memory_kb)?;

        debug!("cgroups for container {container_id} ready");
        Ok(set)
    }

    fn write_cpuset(&self, pid: Pid, cpus: &str) -> Result<(), SandboxError> {
        let path = self.controller_path("cpuset");
        write_ctrl_file(&path, "cpuset.mems", "0")?;
        write_ctrl_file(&path, "cpuset.cpus", cpus)?;
        write_ctrl_file(&path, "tasks", &pid.to_string())
    }

    fn write_cpu(&self, pid: Pid) -> Result<(), SandboxError> {
        let path = self.controller_path("cpu");
        write_ctrl_file(&path, "cpu.cfs_quota_us", &CPU_QUOTA_US.to_string())?;
        write_ctrl_file(&path, "tasks", &pid.to_string())
    }

    fn write_pids(&self, pid: Pid) -> Result<(), SandboxError> {
        let path = self.controller_path("pids");
        write_ctrl_file(&path, "pids.max", &PIDS_MAX.to_string())?;
        // cgroup.procs (not tasks) moves the whole thread group, covering a
        // multi-threaded launcher; the other controllers use tasks because
        // the parent is single-threaded at this point.
        write_ctrl_file(&path, "cgroup.procs", &pid.to_string())
    }

    fn write_memory(&self, pid: Pid, memory_kb: u64) -> Result<(), SandboxError> {
        let path = self.controller_path("memory");
        // Kernel memory limit must be written before any task joins: the
        // kernel forbids changing it once the group is non-empty.
        write_ctrl_file(&path, "memory.kmem.limit_in_bytes", KERNEL_MEMORY_LIMIT)?;
        write_ctrl_file(&path, "memory.limit_in_bytes", &format!("{memory_kb}K"))?;
        write_ctrl_file(&path, "tasks", &pid.to_string())
    }

    /// Parses `memory.oom_control` as `key value` lines; `oom_kill` is true
    /// iff the kernel-exported counter of that name is present and nonzero.
    pub fn oom_indicator(&self) -> Result<OomIndicator, SandboxError> {
        let path = self.controller_path("memory").join("memory.oom_control");
        let content = std::fs::read_to_string(&path)
            .map_err(|err| SandboxError::setup(format!("cannot read {path:?}: {err}")))?;
        Ok(parse_oom_control(&content))
    }

    /// Best-effort teardown of the four directories. Errors are logged, not
    /// propagated: an outer system (host cron, per-boot tmpfs) is the
    /// authoritative cleanup mechanism per spec.md §9, this is a courtesy.
    pub fn teardown(&self) {
        for controller in CONTROLLERS {
            let path = self.controller_path(controller);
            if let Err(err) = remove_dir(&path) {
                warn!("cannot remove cgroup dir {path:?}: {err}");
            }
        }
    }
}

fn parse_oom_control(content: &str) -> OomIndicator {
    let mut oom_kill = false;
    for line in content.lines() {
        if line.is_empty() {
            continue;
        }
        if let Some((key, value)) = line.split_once(' ') {
            if key == "oom_kill" {
                oom_kill = value.trim() != "0";
            }
        }
    }
    OomIndicator { oom_kill }
}

fn write_ctrl_file(dir: &Path, name: &str, value: &str) -> Result<(), SandboxError> {
    let path = dir.join(name);
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .map_err(|err| SandboxError::setup(format!("cannot open {path:?}: {err}")))?;
    file.write_all(value.as_bytes())
        .map_err(|err| SandboxError::setup(format!("cannot write {value:?} to {path:?}: {err}")))?;
    debug!("wrote {value:?} to {path:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oom_indicator_parses_nonzero_counter() {
        let content = "oom_kill_disable 0\nunder_oom 0\noom_kill 1\n";
        assert!(parse_oom_control(content).oom_kill);
    }

    #[test]
    fn oom_indicator_parses_zero_counter() {
        let content = "oom_kill_disable 0\noom_kill 0\n";
        assert!(!parse_oom_control(content).oom_kill);
    }

    #[test]
    fn oom_indicator_absent_key_is_false() {
        let content = "oom_kill_disable 0\nunder_oom 1\n";
        assert!(!parse_oom_control(content).oom_kill);
    }
}
