// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("nix error: {0}")]
    NixError(#[from] nix::Error),
    #[error("Unrecognized component: '{0}'.")]
    UnknownComponent(String),
    #[error("Component needs to be specified.")]
    ComponentRequired,
    #[error("Unrecognized sub-command: '{0}'.")]
    UnrecognizedCommand(String),
    #[error("`{program}` exited with {status}")]
    LaunchFailed { program: String, status: ExitStatus },
    #[error("an error occured: {0}")]
    ErrorMsg(String),
    #[error("an error occured: {0}")]
    ErrorStr(&'static str),
}

#[derive(Error, Debug)]
#[error(transparent)]
pub struct Error(ErrorKind);

impl Error {
    fn from_kind(kind: ErrorKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Errors that stem from a bad invocation rather than from the services themselves
    pub fn is_configuration(&self) -> bool {
        matches!(
            self.0,
            ErrorKind::UnknownComponent(_)
                | ErrorKind::ComponentRequired
                | ErrorKind::UnrecognizedCommand(_)
        )
    }
}

impl<E> From<E> for Error
where
    E: Into<ErrorKind>,
{
    fn from(err: E) -> Self {
        Self::from_kind(err.into())
    }
}

impl From<&'static str> for Error {
    fn from(err: &'static str) -> Self {
        Self::from_kind(ErrorKind::ErrorStr(err))
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::from_kind(ErrorKind::ErrorMsg(err))
    }
}
