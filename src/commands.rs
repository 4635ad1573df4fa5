// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Sub-commands of the `hermes` binary

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use tracing::info;

use crate::error::ErrorKind;
use crate::output::UserOutput;
use crate::procs::{BatchReport, Mode, Outcome, ProcessController, Supervisor};
use crate::Error;

pub const START: &str = "start";
pub const RUN: &str = "run";
pub const STOP: &str = "stop";
pub const RESTART: &str = "restart";
pub const RERUN: &str = "rerun";
pub const STATUS: &str = "status";
pub const PID: &str = "pid";
pub const INSIDE: &str = "inside";

const COMPONENTS: &str = "components";
const COMPONENT: &str = "component";
const COMMAND: &str = "command";

/// A parsed invocation of the `hermes` binary
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start(Vec<String>),
    Run(String),
    Stop(Vec<String>),
    Restart(Vec<String>),
    Rerun(String),
    Status(Vec<String>),
    Pid(String),
    Inside {
        component: String,
        program: String,
        args: Vec<String>,
    },
}

fn components_arg() -> Arg<'static, 'static> {
    Arg::with_name(COMPONENTS)
        .multiple(true)
        .help("components to act on, all of them when omitted")
}

fn component_arg() -> Arg<'static, 'static> {
    Arg::with_name(COMPONENT).help("the component to act on")
}

/// Every sub-command, ready to be attached to the top level App
pub fn sub_commands() -> Vec<App<'static, 'static>> {
    vec![
        SubCommand::with_name(START)
            .about("start components as daemons")
            .arg(components_arg()),
        SubCommand::with_name(RUN)
            .about("start one component in the foreground")
            .arg(component_arg()),
        SubCommand::with_name(STOP)
            .about("kill running components")
            .arg(components_arg()),
        SubCommand::with_name(RESTART)
            .about("stop then start components as daemons")
            .arg(components_arg()),
        SubCommand::with_name(RERUN)
            .about("stop one component then start it in the foreground")
            .arg(component_arg()),
        SubCommand::with_name(STATUS)
            .alias("st")
            .about("show which components are up")
            .arg(components_arg()),
        SubCommand::with_name(PID)
            .about("print the PID recorded for a component")
            .arg(component_arg()),
        SubCommand::with_name(INSIDE)
            .about("run a command in the working directory of a component")
            .setting(AppSettings::TrailingVarArg)
            .arg(component_arg())
            .arg(
                Arg::with_name(COMMAND)
                    .multiple(true)
                    .allow_hyphen_values(true)
                    .help("the command and its arguments"),
            ),
    ]
}

impl Command {
    /// Converts the selected sub-command, `name` is whatever clap reported, known or not
    pub fn from_matches(name: &str, args: Option<&ArgMatches<'_>>) -> Result<Self, Error> {
        let components = || values(args, COMPONENTS);
        let component = || {
            args.and_then(|args| args.value_of(COMPONENT))
                .map(str::to_string)
                .ok_or_else(|| Error::from(ErrorKind::ComponentRequired))
        };

        let command = match name {
            START => Command::Start(components()),
            RUN => Command::Run(component()?),
            STOP => Command::Stop(components()),
            RESTART => Command::Restart(components()),
            RERUN => Command::Rerun(component()?),
            STATUS => Command::Status(components()),
            PID => Command::Pid(component()?),
            INSIDE => {
                let component = component()?;
                let mut command = values(args, COMMAND).into_iter();
                let program = command
                    .next()
                    .ok_or_else(|| Error::from("a command is required"))?;

                Command::Inside {
                    component,
                    program,
                    args: command.collect(),
                }
            }
            other => return Err(ErrorKind::UnrecognizedCommand(other.to_string()).into()),
        };

        Ok(command)
    }

    /// Runs the command to completion
    ///
    /// Only configuration errors are returned for batch commands, everything else is reported
    ///   through the supervisor's output.
    pub async fn execute<C: ProcessController>(
        self,
        supervisor: &Supervisor<'_, C>,
        output: &dyn UserOutput,
    ) -> Result<(), Error> {
        match self {
            Command::Start(names) => {
                summarize(START, supervisor.start_all(&names[..], Mode::Daemon).await?)
            }
            Command::Stop(names) => summarize(STOP, supervisor.stop_all(&names[..]).await?),
            Command::Restart(names) => {
                summarize(RESTART, supervisor.restart_all(&names[..], Mode::Daemon).await?)
            }
            Command::Run(name) => log_outcome(RUN, &name, &supervisor.run_foreground(&name).await?),
            Command::Rerun(name) => {
                log_outcome(RERUN, &name, &supervisor.rerun_foreground(&name).await?)
            }
            Command::Status(names) => {
                supervisor.status(&names[..])?;
            }
            Command::Pid(name) => {
                let component = supervisor.registry().resolve(&name)?;
                match supervisor.pid_of(component) {
                    Some(pid) => output.info(&format!("{} {}", component.name(), pid)),
                    None => output.info(&format!("{} Not Found", component.name())),
                }
            }
            Command::Inside {
                component,
                program,
                args,
            } => supervisor.inside(&component, &program, &args).await?,
        }

        Ok(())
    }
}

fn values(args: Option<&ArgMatches<'_>>, name: &str) -> Vec<String> {
    args.and_then(|args| args.values_of(name))
        .map(|values| values.map(str::to_string).collect())
        .unwrap_or_default()
}

fn summarize(command: &str, report: BatchReport) {
    for (name, outcome) in &report.outcomes {
        log_outcome(command, name, outcome);
    }

    info!(
        command,
        components = report.outcomes.len(),
        failures = report.failures(),
        "batch finished"
    );
}

fn log_outcome(command: &str, name: &str, outcome: &Outcome) {
    info!(command, component = name, ?outcome, "component finished");
}
