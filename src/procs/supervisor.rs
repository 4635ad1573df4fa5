// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fs;

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::output::UserOutput;
use crate::procs::launcher::{self, Invocation, Mode, PID_DIR, PID_FILE};
use crate::procs::ProcessController;
use crate::registry::{Component, LauncherKind, Registry};
use crate::Error;

/// A process started by the supervisor
///
/// The PID is only known once the launcher has written its PID file, which the supervisor
///   does not wait for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessHandle {
    pub component: String,
    pub pid: Option<Pid>,
    pub daemon: bool,
}

/// What happened to one component
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Started(ProcessHandle),
    AlreadyRunning,
    LaunchFailed(String),
    Stopped,
    NotRunning,
    /// The component looked alive, but its PID could not be read back
    PidNotFound,
    StopFailed(String),
}

impl Outcome {
    /// Only launcher and signal failures count, being in the desired state already does not
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::LaunchFailed(_) | Outcome::StopFailed(_))
    }
}

/// Per-component outcomes of one batch, in the order the components were processed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<(String, Outcome)>,
}

impl BatchReport {
    fn push(&mut self, component: &Component, outcome: Outcome) {
        self.outcomes.push((component.name().to_string(), outcome));
    }

    pub fn get(&self, name: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(component, _)| component == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }
}

/// Starts, stops and probes the components of a [`Registry`]
///
/// Everything runs sequentially. Liveness is checked before acting, with nothing held between
///   the check and the action, so two supervisors racing on the same component may both act.
pub struct Supervisor<'a, C> {
    registry: &'a Registry,
    controller: C,
    output: &'a dyn UserOutput,
    verbose: bool,
}

impl<'a, C: ProcessController> Supervisor<'a, C> {
    pub fn new(registry: &'a Registry, controller: C, output: &'a dyn UserOutput) -> Self {
        Self {
            registry,
            controller,
            output,
            verbose: false,
        }
    }

    /// Pass the output of launched commands through to the terminal
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Reads the PID file of a web application; absent or garbled files yield `None`
    pub fn pid_of(&self, component: &Component) -> Option<Pid> {
        if !component.kind().uses_pid_file() {
            return None;
        }

        let path = component.working_dir().join(PID_FILE);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no pid file");
                return None;
            }
        };

        match contents.trim().parse::<i32>() {
            Ok(pid) if pid > 0 => Some(Pid::from_raw(pid)),
            _ => {
                warn!(path = %path.display(), contents = %contents.trim(), "unreadable pid file");
                None
            }
        }
    }

    pub fn is_running(&self, component: &Component) -> bool {
        match component.kind() {
            LauncherKind::Database => self.controller.is_name_running(launcher::database_process()),
            kind => {
                let pid = match self.pid_of(component) {
                    Some(pid) => pid,
                    None => return false,
                };

                launcher::interpreter(kind)
                    .map(|interpreter| self.controller.is_pid_running(pid, interpreter))
                    .unwrap_or(false)
            }
        }
    }

    pub async fn start(&self, component: &Component, mode: Mode) -> Outcome {
        if self.is_running(component) {
            self.output.warn(&format!(
                "{} \"{}\" is already running!",
                noun(component.kind()),
                component.name()
            ));
            return Outcome::AlreadyRunning;
        }

        match component.kind() {
            LauncherKind::Database => self.output.info("Starting Database..."),
            _ if mode.is_daemon() => self
                .output
                .info(&format!("Starting {} as a Daemon...", component.name())),
            _ => self
                .output
                .info(&format!("Starting {} in the foreground...", component.name())),
        }

        if let Err(e) = self.launch(component, mode).await {
            self.output.warn(&format!(
                "Start {} {} FAILED!",
                launcher::describe(component.kind()),
                component.name()
            ));
            return Outcome::LaunchFailed(e.to_string());
        }

        Outcome::Started(ProcessHandle {
            component: component.name().to_string(),
            pid: None,
            daemon: mode.is_daemon(),
        })
    }

    async fn launch(&self, component: &Component, mode: Mode) -> Result<(), Error> {
        if component.kind().uses_pid_file() {
            fs::create_dir_all(component.working_dir().join(PID_DIR))?;
        }

        for invocation in launcher::start_plan(component, mode) {
            self.controller.launch(&invocation, self.verbose).await?;
        }

        Ok(())
    }

    /// Forcefully kills the component, there is no grace period and no check that it exited
    pub async fn stop(&self, component: &Component) -> Outcome {
        if !self.is_running(component) {
            self.output.warn(&format!(
                "{} \"{}\" is not running.",
                noun(component.kind()),
                component.name()
            ));
            return Outcome::NotRunning;
        }

        let result = match launcher::stop_plan(component) {
            Some(invocation) => self.run(&invocation).await,
            None => match self.pid_of(component) {
                Some(pid) => self.controller.signal(pid, Signal::SIGKILL),
                None => {
                    self.output.warn(&format!(
                        "PID of \"{}\" Not Found, nothing to stop.",
                        component.name()
                    ));
                    return Outcome::PidNotFound;
                }
            },
        };

        match result {
            Ok(()) => Outcome::Stopped,
            Err(e) => {
                self.output.warn(&format!(
                    "Stop {} {} FAILED.",
                    launcher::describe(component.kind()),
                    component.name()
                ));
                Outcome::StopFailed(e.to_string())
            }
        }
    }

    async fn run(&self, invocation: &Invocation) -> Result<(), Error> {
        self.controller.launch(invocation, self.verbose).await
    }

    /// Stop then start, the start is skipped if the stop failed
    pub async fn restart(&self, component: &Component, mode: Mode) -> Outcome {
        let stopped = self.stop(component).await;
        if stopped.is_failure() {
            return stopped;
        }

        self.start(component, mode).await
    }

    pub async fn start_all<S: AsRef<str>>(
        &self,
        names: &[S],
        mode: Mode,
    ) -> Result<BatchReport, Error> {
        let mut report = BatchReport::default();
        for component in self.registry.expand(names)? {
            report.push(component, self.start(component, mode).await);
        }

        Ok(report)
    }

    pub async fn stop_all<S: AsRef<str>>(&self, names: &[S]) -> Result<BatchReport, Error> {
        let mut report = BatchReport::default();
        for component in self.registry.expand(names)? {
            self.output.info(&format!("Stopping {}...", component.name()));
            report.push(component, self.stop(component).await);
        }

        Ok(report)
    }

    pub async fn restart_all<S: AsRef<str>>(
        &self,
        names: &[S],
        mode: Mode,
    ) -> Result<BatchReport, Error> {
        let mut report = BatchReport::default();
        for component in self.registry.expand(names)? {
            report.push(component, self.restart(component, mode).await);
        }

        Ok(report)
    }

    /// Starts a single component attached to the terminal
    pub async fn run_foreground(&self, name: &str) -> Result<Outcome, Error> {
        let component = self.registry.resolve(name)?;
        Ok(self.start(component, Mode::Foreground).await)
    }

    /// Restarts a single component attached to the terminal
    pub async fn rerun_foreground(&self, name: &str) -> Result<Outcome, Error> {
        let component = self.registry.resolve(name)?;
        Ok(self.restart(component, Mode::Foreground).await)
    }

    /// Reports `√` or `X` for each component, probe failures count as down
    pub fn status<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<(String, bool)>, Error> {
        let components = self.registry.expand(names)?;

        Ok(components
            .into_iter()
            .map(|component| {
                let up = self.is_running(component);
                let marker = if up { '√' } else { 'X' };
                self.output.info(&format!("{} {}", marker, component.name()));

                (component.name().to_string(), up)
            })
            .collect())
    }

    /// Runs an arbitrary command in the working directory of a component, output passes through
    pub async fn inside(&self, name: &str, program: &str, args: &[String]) -> Result<(), Error> {
        let component = self.registry.resolve(name)?;
        let invocation = Invocation {
            program: program.to_string(),
            args: args.to_vec(),
            cwd: component.working_dir().to_path_buf(),
        };

        self.controller.launch(&invocation, true).await
    }
}

fn noun(kind: LauncherKind) -> &'static str {
    match kind {
        LauncherKind::Database => "Database",
        LauncherKind::Rackup => "Service",
        LauncherKind::Rails => "Application",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::output::RecordedOutput;

    /// Answers probes from fixed tables, launches always succeed
    #[derive(Default)]
    struct TableController {
        names: HashSet<String>,
        pids: Vec<(i32, String)>,
        signals: Mutex<Vec<(Pid, Signal)>>,
        launches: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProcessController for TableController {
        async fn launch(&self, invocation: &Invocation, _verbose: bool) -> Result<(), Error> {
            self.launches.lock().unwrap().push(invocation.to_string());
            Ok(())
        }

        fn is_name_running(&self, name: &str) -> bool {
            self.names.contains(name)
        }

        fn is_pid_running(&self, pid: Pid, interpreter: &str) -> bool {
            self.pids
                .iter()
                .any(|(p, cmd)| *p == pid.as_raw() && cmd.contains(interpreter))
        }

        fn signal(&self, pid: Pid, signal: Signal) -> Result<(), Error> {
            self.signals.lock().unwrap().push((pid, signal));
            Ok(())
        }
    }

    fn app(dir: &tempfile::TempDir, pid: Option<&str>) -> Component {
        if let Some(pid) = pid {
            fs::create_dir_all(dir.path().join(PID_DIR)).unwrap();
            fs::write(dir.path().join(PID_FILE), pid).unwrap();
        }

        Component::new("core", dir.path(), LauncherKind::Rails)
    }

    #[test]
    fn test_pid_of() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::default();
        let output = RecordedOutput::new();
        let supervisor = Supervisor::new(&registry, TableController::default(), &output);

        let missing = app(&dir, None);
        assert_eq!(supervisor.pid_of(&missing), None);

        let component = app(&dir, Some("4242\n"));
        assert_eq!(supervisor.pid_of(&component), Some(Pid::from_raw(4242)));

        let garbled = app(&dir, Some("not a pid"));
        assert_eq!(supervisor.pid_of(&garbled), None);
    }

    #[test]
    fn test_pid_must_belong_to_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let component = app(&dir, Some("4242"));
        let registry = Registry::default();
        let output = RecordedOutput::new();

        let unrelated = TableController {
            pids: vec![(4242, "/usr/bin/python3 worker.py".to_string())],
            ..TableController::default()
        };
        let supervisor = Supervisor::new(&registry, unrelated, &output);
        assert!(!supervisor.is_running(&component));

        let ruby = TableController {
            pids: vec![(4242, "/usr/bin/ruby bin/rails server".to_string())],
            ..TableController::default()
        };
        let supervisor = Supervisor::new(&registry, ruby, &output);
        assert!(supervisor.is_running(&component));
    }

    #[test]
    fn test_database_liveness_by_name() {
        let component = Component::new("mongodb", "/", LauncherKind::Database);
        let registry = Registry::default();
        let output = RecordedOutput::new();

        let supervisor = Supervisor::new(&registry, TableController::default(), &output);
        assert!(!supervisor.is_running(&component));

        let running = TableController {
            names: vec!["mongod".to_string()].into_iter().collect(),
            ..TableController::default()
        };
        let supervisor = Supervisor::new(&registry, running, &output);
        assert!(supervisor.is_running(&component));
    }

    #[tokio::test]
    async fn test_stop_sends_sigkill() {
        let dir = tempfile::tempdir().unwrap();
        let component = app(&dir, Some("4242"));
        let registry = Registry::default();
        let output = RecordedOutput::new();
        let controller = TableController {
            pids: vec![(4242, "ruby".to_string())],
            ..TableController::default()
        };

        let supervisor = Supervisor::new(&registry, controller, &output);
        assert_eq!(supervisor.stop(&component).await, Outcome::Stopped);
        assert_eq!(
            *supervisor.controller().signals.lock().unwrap(),
            vec![(Pid::from_raw(4242), Signal::SIGKILL)]
        );
    }

    #[tokio::test]
    async fn test_start_creates_pid_dir() {
        let dir = tempfile::tempdir().unwrap();
        let component = app(&dir, None);
        let registry = Registry::default();
        let output = RecordedOutput::new();

        let supervisor = Supervisor::new(&registry, TableController::default(), &output);
        let outcome = supervisor.start(&component, Mode::Daemon).await;

        assert_eq!(
            outcome,
            Outcome::Started(ProcessHandle {
                component: "core".to_string(),
                pid: None,
                daemon: true,
            })
        );
        assert!(dir.path().join(PID_DIR).is_dir());
        assert_eq!(
            *supervisor.controller().launches.lock().unwrap(),
            vec!["bundle".to_string(), "rails server -d".to_string()]
        );
        assert_eq!(output.infos(), vec!["Starting core as a Daemon...".to_string()]);
    }

    #[test]
    fn test_outcome_failures() {
        assert!(Outcome::LaunchFailed(String::new()).is_failure());
        assert!(Outcome::StopFailed(String::new()).is_failure());
        assert!(!Outcome::AlreadyRunning.is_failure());
        assert!(!Outcome::NotRunning.is_failure());
        assert!(!Outcome::PidNotFound.is_failure());
        assert!(!Outcome::Stopped.is_failure());
    }
}
