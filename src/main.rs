use clap::Parser;
use line_follow::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_CHANNEL_CAPACITY, FollowConfig, follow, logging,
};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

/// Print every line of a file, then keep printing lines as they are appended.
#[derive(Parser, Debug)]
#[command(name = "line-follow", version, about)]
struct Cli {
    /// File to follow
    path: PathBuf,

    /// Initial read buffer size in bytes
    #[arg(long, default_value_t = DEFAULT_BUFFER_CAPACITY)]
    buffer_capacity: usize,

    /// Lines held in the handoff channel before the reader is throttled
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: usize,

    /// Milliseconds to wait for a graceful stop before killing the reader
    #[arg(long, default_value_t = 2000)]
    grace_ms: u64,

    /// Stop after this many lines
    #[arg(long)]
    max_lines: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let config = FollowConfig::default()
        .with_buffer_capacity(cli.buffer_capacity)
        .with_channel_capacity(cli.channel_capacity)
        .with_grace_period(Duration::from_millis(cli.grace_ms));

    let mut session = match follow(&cli.path, config).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error starting follow: {}", e);
            process::exit(1);
        }
    };

    let mut count = 0u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = session.next_line() => match line {
                Some(line) => {
                    println!("{}", line);
                    count += 1;
                    if cli.max_lines.is_some_and(|max| count >= max) {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    session.stop().await;

    if let Some(e) = session.last_error() {
        eprintln!("Reader stopped with error: {}", e);
        process::exit(1);
    }
}
