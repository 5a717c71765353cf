//! Session configuration.

use crate::error::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::time::Duration;

/// Default size of the read buffer in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Default number of lines the handoff channel holds before the reader is throttled.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// How long `stop()` waits for a graceful exit before killing the reader.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// The external process that emits the file's bytes, followed by every appended byte.
///
/// The target path is always passed as the last argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ReaderCommand {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    /// Appends an argument placed before the target path.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Full argument list for following `path`.
    pub(crate) fn args_for(&self, path: &Path) -> Vec<OsString> {
        let mut args = self.args.clone();
        args.push(path.as_os_str().to_os_string());
        args
    }
}

impl Default for ReaderCommand {
    /// `tail -c +1 -f`: start at byte offset 0 and keep reading.
    fn default() -> Self {
        Self::new("tail").args(["-c", "+1", "-f"])
    }
}

/// Tunables for a follow session.
#[derive(Debug, Clone)]
pub struct FollowConfig {
    pub buffer_capacity: usize,
    pub channel_capacity: usize,
    pub grace_period: Duration,
    pub reader: ReaderCommand,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            grace_period: DEFAULT_GRACE_PERIOD,
            reader: ReaderCommand::default(),
        }
    }
}

impl FollowConfig {
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_reader(mut self, reader: ReaderCommand) -> Self {
        self.reader = reader;
        self
    }

    /// Rejects values that would make the session unusable.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(invalid("buffer capacity must be positive"));
        }
        if self.channel_capacity == 0 {
            return Err(invalid("channel capacity must be positive"));
        }
        if self.reader.program.is_empty() {
            return Err(invalid("reader program must not be empty"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidConfig {
        message: message.to_string(),
    }
}
