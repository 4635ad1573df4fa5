// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Supervisor for the services of a local Hermes checkout

pub mod commands;
pub mod config;
mod error;
pub mod output;
pub mod procs;
pub mod registry;

pub use config::Config;
pub use error::{Error, ErrorKind};
pub use registry::{Component, LauncherKind, Registry};
