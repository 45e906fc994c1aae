//! `VerdictClassifier`: combines the supervisor's timer-fired flag, the
//! cgroup's post-run OOM readout, and the user binary's own exit/signal
//! status into the single verdict line spec.md §4.5 and §6 describe.
//!
//! Signal names are rendered to match Go's `os.ProcessState.String()`
//! vocabulary exactly (`segmentation fault`, `floating point exception`,
//! `aborted`, `killed`, ...) because the judge's external test harness
//! matches these strings as bit-stable substrings (spec.md §6); `nix`'s own
//! `Signal` `Display` impl does not produce them, so a small lookup table
//! stands in.

use crate::cgroup::OomIndicator;
use crate::supervisor::UserOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The user binary exited; `0` is success and produces no stderr line.
    Exit(i32),
    TimeLimit,
    MemoryLimit,
    Signal { name: &'static str, core_dumped: bool },
    InternalError(String),
}

impl Verdict {
    /// The line this verdict puts on stderr, or `None` for a clean exit.
    pub fn stderr_line(&self) -> Option<String> {
        match self {
            Verdict::Exit(0) => None,
            Verdict::Exit(code) => Some(format!("exit status {code}")),
            Verdict::TimeLimit => Some("Time Limit Error".to_owned()),
            Verdict::MemoryLimit => Some("Memory Limit Error".to_owned()),
            Verdict::Signal { name, core_dumped } => Some(if *core_dumped {
                format!("signal: {name} (core dumped)")
            } else {
                format!("signal: {name}")
            }),
            Verdict::InternalError(msg) => Some(msg.clone()),
        }
    }
}

/// Evaluated in order: a timer-induced SIGKILL is `TimeLimit`, never
/// `Signal`; an OOM-induced SIGKILL is `MemoryLimit`, never `Signal`. Only
/// once both are ruled out does the user binary's own exit/signal status
/// (or, failing that, the reason the namespaced child never reported one)
/// decide the verdict.
pub fn classify(
    timer_fired: bool,
    oom: OomIndicator,
    outcome: Option<&UserOutcome>,
    child_failure: Option<&str>,
) -> Verdict {
    if timer_fired {
        return Verdict::TimeLimit;
    }
    if oom.oom_kill {
        return Verdict::MemoryLimit;
    }
    match outcome {
        Some(UserOutcome::Exited(code)) => Verdict::Exit(*code),
        Some(UserOutcome::Signaled { signal, core_dumped }) => Verdict::Signal {
            name: signal_name(*signal),
            core_dumped: *core_dumped,
        },
        Some(UserOutcome::ExecFailed(msg)) => Verdict::InternalError(msg.clone()),
        None => Verdict::InternalError(
            child_failure.unwrap_or("sandbox child terminated unexpectedly").to_owned(),
        ),
    }
}

fn signal_name(signal: i32) -> &'static str {
    match signal {
        nix::libc::SIGSEGV => "segmentation fault",
        nix::libc::SIGFPE => "floating point exception",
        nix::libc::SIGABRT => "aborted",
        nix::libc::SIGKILL => "killed",
        nix::libc::SIGBUS => "bus error",
        nix::libc::SIGILL => "illegal instruction",
        nix::libc::SIGPIPE => "broken pipe",
        nix::libc::SIGTERM => "terminated",
        _ => "unknown signal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oom(kill: bool) -> OomIndicator {
        OomIndicator { oom_kill: kill }
    }

    #[test]
    fn timer_dominates_everything() {
        let outcome = UserOutcome::Signaled { signal: nix::libc::SIGKILL, core_dumped: false };
        assert_eq!(classify(true, oom(true), Some(&outcome), None), Verdict::TimeLimit);
    }

    #[test]
    fn oom_dominates_signal() {
        let outcome = UserOutcome::Signaled { signal: nix::libc::SIGKILL, core_dumped: false };
        assert_eq!(classify(false, oom(true), Some(&outcome), None), Verdict::MemoryLimit);
    }

    #[test]
    fn plain_segfault_reports_core_dump() {
        let outcome = UserOutcome::Signaled { signal: nix::libc::SIGSEGV, core_dumped: true };
        let verdict = classify(false, oom(false), Some(&outcome), None);
        assert_eq!(
            verdict.stderr_line().unwrap(),
            "signal: segmentation fault (core dumped)"
        );
    }

    #[test]
    fn killed_signal_has_no_core_dump_suffix() {
        let outcome = UserOutcome::Signaled { signal: nix::libc::SIGKILL, core_dumped: false };
        let verdict = classify(false, oom(false), Some(&outcome), None);
        assert_eq!(verdict.stderr_line().unwrap(), "signal: killed");
    }

    #[test]
    fn successful_exit_has_no_stderr_line() {
        let outcome = UserOutcome::Exited(0);
        let verdict = classify(false, oom(false), Some(&outcome), None);
        assert_eq!(verdict.stderr_line(), None);
    }

    #[test]
    fn nonzero_exit_reports_code() {
        let outcome = UserOutcome::Exited(7);
        let verdict = classify(false, oom(false), Some(&outcome), None);
        assert_eq!(verdict.stderr_line().unwrap(), "exit status 7");
    }

    #[test]
    fn missing_report_falls_back_to_child_failure() {
        let verdict = classify(false, oom(false), None, Some("setup exploded"));
        assert_eq!(verdict.stderr_line().unwrap(), "setup exploded");
    }
}
