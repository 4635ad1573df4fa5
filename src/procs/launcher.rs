// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::registry::{Component, LauncherKind};

/// Location of the server PID file, relative to the component working directory
pub const PID_FILE: &str = "tmp/pids/server.pid";
pub const PID_DIR: &str = "tmp/pids";

const DATABASE_SERVICE: &str = "mongodb";
const DATABASE_PROCESS: &str = "mongod";
const WEB_INTERPRETER: &str = "ruby";

/// How a component should be launched
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Detached from the terminal, the launcher returns once the server is up
    Daemon,
    /// Attached to the terminal, blocks until the server exits
    Foreground,
}

impl Mode {
    pub fn is_daemon(self) -> bool {
        self == Mode::Daemon
    }
}

/// A single external command, run inside a working directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(program: &str, args: &[&str], cwd: &Path) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: cwd.to_path_buf(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }

        Ok(())
    }
}

/// Commands that bring the component up, in order; the first failure aborts the rest
pub fn start_plan(component: &Component, mode: Mode) -> Vec<Invocation> {
    let cwd = component.working_dir();

    match component.kind() {
        // the service manager always detaches the database, regardless of mode
        LauncherKind::Database => vec![Invocation::new(
            "brew",
            &["services", "start", DATABASE_SERVICE],
            cwd,
        )],
        LauncherKind::Rackup => {
            let mut args = Vec::with_capacity(4);
            if mode.is_daemon() {
                args.push("-D");
            }
            args.extend(&["-P", PID_FILE, "config.ru"]);

            vec![
                Invocation::new("bundle", &[], cwd),
                Invocation::new("rackup", &args, cwd),
            ]
        }
        LauncherKind::Rails => {
            let mut args = vec!["server"];
            if mode.is_daemon() {
                args.push("-d");
            }

            vec![
                Invocation::new("bundle", &[], cwd),
                Invocation::new("rails", &args, cwd),
            ]
        }
    }
}

/// Command used to stop components that don't stop by signal
pub fn stop_plan(component: &Component) -> Option<Invocation> {
    match component.kind() {
        LauncherKind::Database => Some(Invocation::new(
            "brew",
            &["services", "stop", DATABASE_SERVICE],
            component.working_dir(),
        )),
        LauncherKind::Rackup | LauncherKind::Rails => None,
    }
}

/// Name of the database engine in the process table
pub fn database_process() -> &'static str {
    DATABASE_PROCESS
}

/// Interpreter a web application's server process must belong to
pub fn interpreter(kind: LauncherKind) -> Option<&'static str> {
    match kind {
        LauncherKind::Database => None,
        LauncherKind::Rackup | LauncherKind::Rails => Some(WEB_INTERPRETER),
    }
}

/// Human facing label used in launch and stop messages
pub fn describe(kind: LauncherKind) -> &'static str {
    match kind {
        LauncherKind::Database => "Database",
        LauncherKind::Rackup => "Sinatra app",
        LauncherKind::Rails => "Rails app",
    }
}
