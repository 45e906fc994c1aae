//! Single-entry UID/GID mapping for the sandboxed user namespace.
//!
//! The teacher crate's `UserMapper` trait (`src/userns.rs`) generalizes to
//! arbitrary subuid/subgid ranges via the external `newuidmap`/`newgidmap`
//! setuid helpers. spec.md's data model calls for exactly one mapping
//! (container-side id 0 to the host-side invoking uid/gid), so this
//! repository writes `/proc/<pid>/{uid_map,gid_map}` directly instead of
//! introducing a dependency on those external binaries.

use std::fs::OpenOptions;
use std::io::Write as _;

use nix::unistd::{Gid, Pid, Uid};

use crate::error::SandboxError;

/// Maps the new user namespace's root (container-side uid/gid 0) onto the
/// invoking process's own uid/gid, then locks `setgroups` down.
///
/// Must run in the parent after `clone` returns the child's pid, and before
/// the child is unblocked to proceed past its own user-namespace barrier:
/// the kernel only allows an unprivileged process to write `gid_map` once
/// `/proc/<pid>/setgroups` has been set to `deny`.
pub fn map_root(pid: Pid, host_uid: Uid, host_gid: Gid) -> Result<(), SandboxError> {
    write_proc_file(pid, "setgroups", "deny")?;
    write_proc_file(pid, "uid_map", &format!("0 {host_uid} 1"))?;
    write_proc_file(pid, "gid_map", &format!("0 {host_gid} 1"))?;
    Ok(())
}

fn write_proc_file(pid: Pid, name: &str, value: &str) -> Result<(), SandboxError> {
    let path = format!("/proc/{pid}/{name}");
    OpenOptions::new()
        .write(true)
        .open(&path)
        .and_then(|mut f| f.write_all(value.as_bytes()))
        .map_err(|err| SandboxError::setup(format!("cannot write {path}: {err}")))
}
