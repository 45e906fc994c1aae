use std::path::PathBuf;

use uuid::Uuid;

/// Immutable parameters of one sandboxed run.
///
/// Mirrors the "Invocation parameters" of the data model: a pre-populated
/// root tree, the relative executable path under it, a wall-clock deadline,
/// a memory ceiling, a cpuset spec, and a freshly generated container id
/// whose uniqueness across concurrent invocations is the caller's
/// responsibility (a v4 UUID makes collision astronomically unlikely, which
/// is the same guarantee the Go original leaned on with `satori/go.uuid`).
#[derive(Debug, Clone)]
pub struct Invocation {
    pub basedir: PathBuf,
    pub command: PathBuf,
    pub timeout_ms: u64,
    pub memory_kb: u64,
    pub cpus: String,
    pub container_id: String,
}

impl Invocation {
    pub fn new(
        basedir: PathBuf,
        command: PathBuf,
        timeout_ms: u64,
        memory_kb: u64,
        cpus: String,
    ) -> Self {
        Self {
            basedir,
            command,
            timeout_ms,
            memory_kb,
            cpus,
            container_id: Uuid::new_v4().simple().to_string(),
        }
    }
}
