//! The external reader process feeding a follow session.

use crate::config::ReaderCommand;
use crate::error::{Error, Result};
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, ChildStdout, Command};

/// A spawned reader together with its captured output.
pub(crate) struct FollowSource {
    pub(crate) child: Child,
    pub(crate) stdout: ChildStdout,
}

/// Checks that `path` exists, then spawns the reader attached to it.
pub(crate) async fn open(path: &Path, reader: &ReaderCommand) -> Result<FollowSource> {
    // Precondition only; the reader itself decides what to do if the file later disappears.
    tokio::fs::metadata(path)
        .await
        .map_err(|source| Error::NotFound {
            path: path.display().to_string(),
            source,
        })?;

    spawn(path, reader)
}

fn spawn(path: &Path, reader: &ReaderCommand) -> Result<FollowSource> {
    let program = reader.program().to_string_lossy().to_string();

    let mut child = Command::new(reader.program())
        .args(reader.args_for(path))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = child.stdout.take().ok_or_else(|| Error::Spawn {
        program,
        source: io::Error::new(io::ErrorKind::BrokenPipe, "stdout was not captured"),
    })?;

    Ok(FollowSource { child, stdout })
}

/// Asks the reader to exit on its own.
#[cfg(unix)]
pub(crate) fn request_interrupt(child: &mut Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        // Already reaped
        return Ok(());
    };
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    // SAFETY: plain signal delivery to a pid we own; no memory is shared.
    let rc = unsafe { libc::kill(pid, libc::SIGINT) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

#[cfg(not(unix))]
pub(crate) fn request_interrupt(child: &mut Child) -> io::Result<()> {
    // No interrupt signal to deliver here, so go straight to termination.
    match child.start_kill() {
        Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
        other => other,
    }
}
