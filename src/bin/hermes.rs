// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use clap::{App, AppSettings, Arg, ArgMatches};
use tokio::runtime;
use tracing_subscriber::EnvFilter;

use hermesrc::commands::{self, Command};
use hermesrc::config::{self, Config};
use hermesrc::output::{ConsoleOutput, UserOutput};
use hermesrc::procs::{Supervisor, SystemController};
use hermesrc::{Error, Registry};

const VERBOSE: &str = "verbose";
const HOME: &str = "home";

trait SetupClapApp {
    fn setup_clap_app(self) -> Self;
}

impl<'a, 'b> SetupClapApp for App<'a, 'b> {
    fn setup_clap_app(self) -> Self {
        self.version(env!("CARGO_PKG_VERSION"))
            .author(env!("CARGO_PKG_AUTHORS"))
    }
}

fn main() {
    let args = App::new("hermes")
        .setup_clap_app()
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::AllowExternalSubcommands)
        .arg(
            Arg::with_name(VERBOSE)
                .short("v")
                .long(VERBOSE)
                .global(true)
                .help("pass the output of the launched commands through"),
        )
        .arg(
            Arg::with_name(HOME)
                .long(HOME)
                .value_name("DIR")
                .env(config::HERMES_HOME)
                .help("root directory of the Hermes checkout")
                .takes_value(true),
        )
        .subcommands(commands::sub_commands())
        .get_matches();

    let output = ConsoleOutput;
    let config = config_from(&args);
    init_tracing(&config);

    if let Err(e) = run(&args, &config, &output) {
        output.error(&e.to_string());
        std::process::exit(if e.is_configuration() { 2 } else { 1 });
    }
}

fn config_from(args: &ArgMatches<'_>) -> Config {
    let mut config = Config::from_env();

    // `--home` falls back to HERMES_HOME through clap
    if let Some(home) = args.value_of_os(HOME).filter(|home| !home.is_empty()) {
        config = config.with_home(home);
    }

    // global args are propagated down to the selected sub-command
    let sub = args.subcommand().1.unwrap_or(args);
    if sub.is_present(VERBOSE) || args.is_present(VERBOSE) {
        config = config.with_verbose(true);
    }

    config
}

fn init_tracing(config: &Config) {
    let default = if config.verbose() {
        "warn,hermesrc=debug"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &ArgMatches<'_>, config: &Config, output: &dyn UserOutput) -> Result<(), Error> {
    let command = match args.subcommand() {
        ("", None) => {
            println!("command required");
            println!("{}", args.usage());
            std::process::exit(1);
        }
        (name, sub) => Command::from_matches(name, sub)?,
    };

    let registry = Registry::from_config(config)?;
    let supervisor =
        Supervisor::new(&registry, SystemController, output).verbose(config.verbose());

    let runtime = runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(command.execute(&supervisor, output))
}
