// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod controller;
pub mod launcher;
mod supervisor;

pub use controller::{ProcessController, SystemController};
pub use launcher::{Invocation, Mode, PID_FILE};
pub use supervisor::{BatchReport, Outcome, ProcessHandle, Supervisor};

pub use nix::sys::signal::Signal;
pub use nix::unistd::Pid;
