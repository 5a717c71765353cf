//! Follow a growing file and receive each appended line as it is written.
//!
//! An external reader process (by default `tail -c +1 -f`) streams the file from
//! its first byte. A background task splits that output into lines and hands them
//! over a bounded channel, so a slow consumer throttles the reader instead of
//! losing lines.
//!
//! # Example
//!
//! ```rust,no_run
//! use line_follow::{FollowConfig, follow};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = follow("app.log", FollowConfig::default()).await?;
//!
//!     while let Some(line) = session.next().await {
//!         println!("New line: {}", line);
//!         if line.contains("shutdown") {
//!             session.stop().await;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
pub mod logging;
mod session;
mod source;
mod splitter;

#[cfg(test)]
mod test_helpers;

// Public API exports
pub use config::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_CHANNEL_CAPACITY, DEFAULT_GRACE_PERIOD, FollowConfig,
    ReaderCommand,
};
pub use error::{Error, Result};
pub use session::{FollowSession, StopHandle};
pub use splitter::{DispatchExit, FollowStats};

use std::path::Path;

/// Starts following a file from its first byte.
///
/// # Arguments
///
/// * `path` - File to follow; must exist
/// * `config` - Buffer, channel, grace period and reader settings
///
/// # Example
///
/// ```rust,no_run
/// use line_follow::{FollowConfig, follow};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = FollowConfig::default().with_buffer_capacity(64 * 1024);
///     let mut session = follow("app.log", config).await?;
///
///     if let Some(line) = session.next_line().await {
///         println!("First line: {}", line);
///     }
///
///     session.stop().await;
///     Ok(())
/// }
/// ```
pub async fn follow<P: AsRef<Path>>(path: P, config: FollowConfig) -> Result<FollowSession> {
    FollowSession::start_with(path, config).await
}
