//! `NamespaceInitializer`: runs inside the cloned child, after clone but
//! before `exec` of the user binary, and renders the new mount namespace
//! into a minimal working root at `basedir`.
//!
//! Grounded in the teacher crate's `setup_mount_namespace`/`remount_private_root`/
//! `pivot_root` (`src/mounts.rs`); trimmed to the fixed mount set spec.md §4.2
//! names (no pluggable `Mount` trait, no overlay layering, since this
//! repository's `basedir` already is the fully prepared root tree) and with a
//! mandatory `/proc` bind rather than the teacher's opt-in `BaseMounts`,
//! because the judge binary's own resource self-accounting depends on it.

use std::fs::create_dir;
use std::io::ErrorKind;
use std::path::Path;

use nix::fcntl::{open, OFlag};
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use nix::unistd::{chdir, fchdir, sethostname};

use crate::error::SandboxError;

const HOSTNAME: &str = "sandbox";

/// Runs the ordered namespace-internal setup spec.md §4.2 describes.
/// Preconditions: caller has already entered a new mount namespace and new
/// UTS namespace (done by `ChildLauncher` via the clone flags).
pub fn init_namespace(basedir: &Path) -> Result<(), SandboxError> {
    sethostname(HOSTNAME).map_err(|err| SandboxError::setup(format!("sethostname: {err}")))?;
    remount_private_root(basedir)?;
    mount_proc(basedir)?;
    pivot_root(basedir)?;
    chdir("/").map_err(|err| SandboxError::setup(format!("chdir: {err}")))?;
    Ok(())
}

/// Makes all mount changes private to this namespace so nothing propagates
/// back to the host, then bind-mounts `basedir` onto itself so it can be
/// pivoted into.
fn remount_private_root(basedir: &Path) -> Result<(), SandboxError> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_SLAVE | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|err| SandboxError::setup(format!("remount / slave: {err}")))?;
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|err| SandboxError::setup(format!("remount / private: {err}")))?;
    mount(
        Some(basedir),
        basedir,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|err| SandboxError::setup(format!("bind mount {basedir:?}: {err}")))?;
    Ok(())
}

fn mount_proc(basedir: &Path) -> Result<(), SandboxError> {
    let target = basedir.join("proc");
    match create_dir(&target) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(err),
    }
    .map_err(|err| SandboxError::setup(format!("mkdir {target:?}: {err}")))?;
    mount(
        Some("proc"),
        &target,
        Some("proc"),
        MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
        None::<&str>,
    )
    .map_err(|err| SandboxError::setup(format!("mount proc on {target:?}: {err}")))
}

fn pivot_root(basedir: &Path) -> Result<(), SandboxError> {
    let new_root = open(
        basedir,
        OFlag::O_DIRECTORY | OFlag::O_RDONLY,
        nix::sys::stat::Mode::empty(),
    )
    .map_err(|err| SandboxError::setup(format!("open {basedir:?}: {err}")))?;
    nix::unistd::pivot_root(basedir, basedir)
        .map_err(|err| SandboxError::setup(format!("pivot_root: {err}")))?;
    // The old root is now stacked on top of the new root at the same path;
    // re-slave it so its unmount below does not propagate, then detach it.
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_SLAVE | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|err| SandboxError::setup(format!("re-slave old root: {err}")))?;
    umount2("/", MntFlags::MNT_DETACH)
        .map_err(|err| SandboxError::setup(format!("detach old root: {err}")))?;
    fchdir(new_root).map_err(|err| SandboxError::setup(format!("fchdir: {err}")))
}
