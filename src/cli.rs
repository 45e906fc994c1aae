//! Command-line surface. Flag names mirror the Go original's flag set
//! (`-basedir`, `-command`, `-timeout`, `-memory`) with `-cpus` added per
//! SPEC_FULL.md so the cpuset controller has something to write besides a
//! hardcoded `"0"`.

use std::path::PathBuf;

use clap::Parser;

use crate::invocation::Invocation;

#[derive(Parser, Debug)]
#[command(name = "justice-sandbox", about = "Runs an untrusted judge submission inside a throwaway namespace/cgroup sandbox")]
pub struct Cli {
    /// Root tree the submission runs under; bind-mounted onto itself and
    /// pivoted into.
    #[arg(long, default_value = "/tmp")]
    pub basedir: PathBuf,

    /// Path to the executable, resolved inside the sandboxed root once
    /// pivoted.
    #[arg(long, default_value = "./Main")]
    pub command: PathBuf,

    /// Wall-clock deadline in milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub timeout: u64,

    /// Memory ceiling in kilobytes.
    #[arg(long, default_value_t = 256)]
    pub memory: u64,

    /// cpuset.cpus spec, e.g. "0" or "0-1".
    #[arg(long, default_value = "0")]
    pub cpus: String,
}

impl Cli {
    pub fn into_invocation(self) -> Invocation {
        Invocation::new(self.basedir, self.command, self.timeout, self.memory, self.cpus)
    }
}
