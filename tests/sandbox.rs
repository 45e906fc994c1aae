//! End-to-end exercise of the full clone → namespace setup → supervised run
//! pipeline against a real busybox rootfs. Needs root (for the cgroup
//! writes) and network access (to fetch the rootfs), so it is `#[ignore]`d,
//! matching the teacher crate's own `test_container` in spirit.

use nix::unistd::getpid;

use justice_sandbox::cgroup::CGroupSet;
use justice_sandbox::invocation::Invocation;
use justice_sandbox::launcher::{ChildLauncher, LaunchOutcome};
use justice_sandbox::supervisor::UserOutcome;
use justice_sandbox::verdict::{self, Verdict};

mod common;
use common::{get_rootfs, TempDir};

fn run_once(basedir: &std::path::Path, command: &str, timeout_ms: u64) -> Verdict {
    let invocation = Invocation::new(
        basedir.to_path_buf(),
        command.into(),
        timeout_ms,
        64 * 1024,
        "0".into(),
    );
    let cgroups =
        CGroupSet::prepare(getpid(), &invocation.container_id, invocation.memory_kb, "0")
            .unwrap();
    let outcome = ChildLauncher::launch(&invocation).unwrap();
    let oom = cgroups.oom_indicator().unwrap_or_default();
    cgroups.teardown();

    match outcome {
        LaunchOutcome::Reported(report) => {
            verdict::classify(report.timer_fired, oom, Some(&report.outcome), None)
        }
        LaunchOutcome::ChildFailed(reason) => verdict::classify(false, oom, None, Some(&reason)),
    }
}

#[test]
#[ignore]
fn successful_command_produces_clean_exit() {
    let tmpdir = TempDir::new().unwrap();
    get_rootfs().unwrap().unpack(tmpdir.as_path()).unwrap();

    let verdict = run_once(tmpdir.as_path(), "/bin/true", 5_000);
    assert_eq!(verdict, Verdict::Exit(0));
}

#[test]
#[ignore]
fn timeout_kills_the_group_and_reports_time_limit() {
    let tmpdir = TempDir::new().unwrap();
    get_rootfs().unwrap().unpack(tmpdir.as_path()).unwrap();

    // /bin/yes takes no arguments and never terminates on its own, so the
    // watcher thread's SIGKILL is the only thing that can end it.
    let verdict = run_once(tmpdir.as_path(), "/bin/yes", 200);
    assert_eq!(verdict, Verdict::TimeLimit);
}

#[test]
#[ignore]
fn missing_binary_reports_as_internal_error_not_a_panic() {
    let tmpdir = TempDir::new().unwrap();
    get_rootfs().unwrap().unpack(tmpdir.as_path()).unwrap();

    let verdict = run_once(tmpdir.as_path(), "/no/such/binary", 5_000);
    match verdict {
        Verdict::InternalError(_) => {}
        other => panic!("expected InternalError, got {other:?}"),
    }
}

#[allow(dead_code)]
fn assert_send<T: Send>() {}

#[test]
fn user_outcome_exited_is_comparable() {
    assert_eq!(UserOutcome::Exited(0), UserOutcome::Exited(0));
}
