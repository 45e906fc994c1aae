//! Exercises the real cgroup-v1 hierarchy; requires root and a host with the
//! legacy `cpuset`/`cpu`/`pids`/`memory` controllers mounted under
//! `/sys/fs/cgroup`, so it is `#[ignore]`d like the teacher crate's own
//! privileged tests (see tests/common.rs).

use std::path::Path;

use justice_sandbox::cgroup::CGroupSet;
use nix::unistd::getpid;

mod common;
use common::rand_string;

#[test]
#[ignore]
fn prepare_writes_limits_and_joins_self() {
    let container_id = format!("justice-sandbox-test-{}", rand_string(16));
    let set = CGroupSet::prepare(getpid(), &container_id, 64 * 1024, "0").unwrap();

    let memory_limit = std::fs::read_to_string(
        Path::new("/sys/fs/cgroup/memory")
            .join(&container_id)
            .join("memory.limit_in_bytes"),
    )
    .unwrap();
    assert_eq!(memory_limit.trim(), (64 * 1024 * 1024).to_string());

    let pids_max = std::fs::read_to_string(
        Path::new("/sys/fs/cgroup/pids")
            .join(&container_id)
            .join("pids.max"),
    )
    .unwrap();
    assert_eq!(pids_max.trim(), "64");

    let oom = set.oom_indicator().unwrap();
    assert!(!oom.oom_kill);

    set.teardown();
    assert!(!Path::new("/sys/fs/cgroup/memory").join(&container_id).exists());
}

#[test]
#[ignore]
fn prepare_rejects_colliding_container_id() {
    let container_id = format!("justice-sandbox-test-{}", rand_string(16));
    let first = CGroupSet::prepare(getpid(), &container_id, 1024, "0").unwrap();
    let second = CGroupSet::prepare(getpid(), &container_id, 1024, "0");
    assert!(second.is_err());
    first.teardown();
}
