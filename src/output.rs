// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::sync::Mutex;

pub const INFO_PREFIX: &str = "#[Hermes][I]: ";
pub const WARN_PREFIX: &str = "#[Hermes][W]: ";
pub const ERROR_PREFIX: &str = "#[Hermes][E]: ";

/// Where the human readable lines of the supervisor go
pub trait UserOutput: Send + Sync {
    fn info(&self, message: &str);

    fn warn(&self, message: &str);

    fn error(&self, message: &str);
}

/// Prefixed lines, info on stdout and everything else on stderr
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleOutput;

impl UserOutput for ConsoleOutput {
    fn info(&self, message: &str) {
        println!("{}{}", INFO_PREFIX, message);
    }

    fn warn(&self, message: &str) {
        eprintln!("{}{}", WARN_PREFIX, message);
    }

    fn error(&self, message: &str) {
        eprintln!("{}{}", ERROR_PREFIX, message);
    }
}

/// A line captured by [`RecordedOutput`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Info(String),
    Warn(String),
    Error(String),
}

/// Keeps every line in memory, in the order written
#[derive(Debug, Default)]
pub struct RecordedOutput {
    lines: Mutex<Vec<Line>>,
}

impl RecordedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<Line> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                Line::Warn(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn infos(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                Line::Info(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, line: Line) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl UserOutput for RecordedOutput {
    fn info(&self, message: &str) {
        self.push(Line::Info(message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.push(Line::Warn(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(Line::Error(message.to_string()));
    }
}
