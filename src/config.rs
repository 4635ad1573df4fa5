// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::env;
use std::path::{Path, PathBuf};

/// Root of the Hermes checkout, every component directory hangs off of it
pub const HERMES_HOME: &str = "HERMES_HOME";
/// Pass launcher output through to the terminal when set to `1` or `true`
pub const HERMES_VERBOSE: &str = "HERMES_VERBOSE";

const DEFAULT_HOME: &str = "code/wrapports/hermes";

/// Settings for a single invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    home: PathBuf,
    verbose: bool,
}

impl Config {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            verbose: false,
        }
    }

    /// Rooted at `$HOME/code/wrapports/hermes`, verbosity from `HERMES_VERBOSE`
    ///
    /// `HERMES_HOME` is read by the command line parser as the fallback for `--home`.
    pub fn from_env() -> Self {
        let home = default_home();
        let verbose = env::var(HERMES_VERBOSE)
            .map(|value| verbose_enabled(&value))
            .unwrap_or(false);

        Self { home, verbose }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

fn default_home() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
        .join(DEFAULT_HOME)
}

/// `1` and `true` turn verbosity on, anything else leaves it off
pub fn verbose_enabled(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_values() {
        assert!(verbose_enabled("1"));
        assert!(verbose_enabled("true"));
        assert!(verbose_enabled("TRUE"));
        assert!(verbose_enabled(" true\n"));

        assert!(!verbose_enabled(""));
        assert!(!verbose_enabled("0"));
        assert!(!verbose_enabled("false"));
        assert!(!verbose_enabled("yes"));
        assert!(!verbose_enabled("2"));
    }

    #[test]
    fn test_builder() {
        let config = Config::new("/tmp/hermes").with_verbose(true);
        assert_eq!(config.home(), Path::new("/tmp/hermes"));
        assert!(config.verbose());

        let config = config.with_home("/srv/hermes");
        assert_eq!(config.home(), Path::new("/srv/hermes"));
        assert!(config.verbose());
    }
}
