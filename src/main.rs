use clap::Parser;
use nix::unistd::getpid;

use justice_sandbox::cgroup::CGroupSet;
use justice_sandbox::cli::Cli;
use justice_sandbox::launcher::{ChildLauncher, LaunchOutcome};
use justice_sandbox::verdict::{self, Verdict};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let invocation = Cli::parse().into_invocation();
    let verdict = run(&invocation);

    if let Some(line) = verdict.stderr_line() {
        eprintln!("{line}");
    }

    // Per spec.md §9: the process's own exit status never encodes the
    // verdict, only stderr does, so every path here exits 0.
    std::process::exit(0);
}

fn run(invocation: &justice_sandbox::invocation::Invocation) -> Verdict {
    let cgroups = match CGroupSet::prepare(
        getpid(),
        &invocation.container_id,
        invocation.memory_kb,
        &invocation.cpus,
    ) {
        Ok(set) => set,
        Err(err) => return Verdict::InternalError(err.to_string()),
    };

    let launch = ChildLauncher::launch(invocation);

    let oom = cgroups.oom_indicator().unwrap_or_default();
    cgroups.teardown();

    match launch {
        Ok(LaunchOutcome::Reported(report)) => verdict::classify(
            report.timer_fired,
            oom,
            Some(&report.outcome),
            None,
        ),
        Ok(LaunchOutcome::ChildFailed(reason)) => {
            verdict::classify(false, oom, None, Some(&reason))
        }
        Err(err) => Verdict::InternalError(err.to_string()),
    }
}
