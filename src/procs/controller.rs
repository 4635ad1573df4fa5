// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::convert::TryFrom;
use std::process::Stdio;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use sysinfo::{Process, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tokio::process::Command;
use tracing::debug;

use crate::error::ErrorKind;
use crate::procs::Invocation;
use crate::Error;

/// Everything the supervisor needs from the operating system
///
/// Keeping this behind a trait lets the supervisor run against a fake process table.
#[async_trait]
pub trait ProcessController: Send + Sync {
    /// Runs the invocation to completion, an unsuccessful exit status is an error
    ///
    /// Output of the command is discarded unless `verbose` is set.
    async fn launch(&self, invocation: &Invocation, verbose: bool) -> Result<(), Error>;

    /// True if any process in the process table has this name
    fn is_name_running(&self, name: &str) -> bool;

    /// True if `pid` is alive and belongs to the `interpreter` family
    fn is_pid_running(&self, pid: Pid, interpreter: &str) -> bool;

    fn signal(&self, pid: Pid, signal: Signal) -> Result<(), Error>;
}

/// Controls real processes on this host
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemController;

impl SystemController {
    fn processes() -> System {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All);
        system
    }

    /// Loads a single process, including its executable path and arguments
    fn process(pid: sysinfo::Pid) -> System {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            ProcessRefreshKind::new()
                .with_cmd(UpdateKind::Always)
                .with_exe(UpdateKind::Always),
        );
        system
    }
}

#[async_trait]
impl ProcessController for SystemController {
    async fn launch(&self, invocation: &Invocation, verbose: bool) -> Result<(), Error> {
        debug!(command = %invocation, cwd = %invocation.cwd.display(), "launching");

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).current_dir(&invocation.cwd);

        if !verbose {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let status = command.status().await?;
        debug!(command = %invocation, %status, "finished");

        if status.success() {
            Ok(())
        } else {
            Err(ErrorKind::LaunchFailed {
                program: invocation.program.clone(),
                status,
            }
            .into())
        }
    }

    fn is_name_running(&self, name: &str) -> bool {
        Self::processes()
            .processes()
            .values()
            .any(|process| process.name() == name)
    }

    fn is_pid_running(&self, pid: Pid, interpreter: &str) -> bool {
        let raw = match u32::try_from(pid.as_raw()) {
            Ok(raw) if raw > 0 => raw,
            _ => return false,
        };

        let pid_to_check = sysinfo::Pid::from_u32(raw);
        let system = Self::process(pid_to_check);
        match system.process(pid_to_check) {
            Some(process) => belongs_to(process, interpreter),
            None => {
                debug!(%pid, "no such process");
                false
            }
        }
    }

    fn signal(&self, pid: Pid, signal: Signal) -> Result<(), Error> {
        debug!(%pid, ?signal, "sending signal");
        signal::kill(pid, signal)?;
        Ok(())
    }
}

/// Server processes often rewrite their title, so the executable path and arguments count too
fn belongs_to(process: &Process, interpreter: &str) -> bool {
    let interpreter = interpreter.to_lowercase();
    let contains = |s: &str| s.to_lowercase().contains(&interpreter);

    if contains(&process.name().to_string_lossy()) {
        return true;
    }

    if let Some(exe) = process.exe() {
        if contains(&exe.to_string_lossy()) {
            return true;
        }
    }

    process
        .cmd()
        .iter()
        .any(|arg| contains(&arg.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    #[tokio::test]
    async fn test_launch_exit_status() {
        let controller = SystemController;
        let cwd = std::env::temp_dir();

        let ok = Invocation::new("true", &[], &cwd);
        assert!(controller.launch(&ok, false).await.is_ok());

        let failed = Invocation::new("false", &[], &cwd);
        let err = controller.launch(&failed, false).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::LaunchFailed { program, .. } if program == "false"));
    }

    #[tokio::test]
    async fn test_launch_missing_program() {
        let missing = Invocation::new("hermes-no-such-program", &[], Path::new("/"));
        let err = SystemController.launch(&missing, false).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IoError(_)));
    }

    #[test]
    fn test_pid_matches_interpreter_in_arguments() {
        // the compound command keeps `sh` from exec'ing `sleep`, so the marker stays in argv
        let mut child = std::process::Command::new("sh")
            .args(&["-c", "sleep 30; exit 0", "hermes-test-marker"])
            .spawn()
            .expect("failed to spawn sh");
        let pid = Pid::from_raw(child.id() as i32);

        let found = SystemController.is_pid_running(pid, "hermes-test-marker");
        let other = SystemController.is_pid_running(pid, "hermes-other-marker");

        child.kill().ok();
        child.wait().ok();

        assert!(found);
        assert!(!other);
    }

    #[test]
    fn test_pid_probe_rejects_other_interpreters() {
        let me = Pid::this();
        assert!(!SystemController.is_pid_running(me, "hermes-no-such-interpreter"));
        assert!(!SystemController.is_pid_running(Pid::from_raw(0), "ruby"));
        assert!(!SystemController.is_pid_running(Pid::from_raw(-4), "ruby"));
    }
}
