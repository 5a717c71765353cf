use line_follow::{FollowConfig, follow};
use std::io::Write;
use std::time::Duration;
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Line Follow Example ===\n");

    let dir = std::env::temp_dir().join(format!("line-follow-demo-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("app.log");

    let mut file = std::fs::File::create(&path)?;
    for i in 1..=3 {
        writeln!(file, "existing line {}", i)?;
    }
    file.flush()?;

    let config = FollowConfig::default()
        .with_buffer_capacity(256)
        .with_grace_period(Duration::from_millis(500));
    let mut session = follow(&path, config).await?;
    println!("Following: {}", session);

    // Keep appending in the background while we read.
    let writer_path = path.clone();
    let writer = tokio::spawn(async move {
        for i in 1..=3 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let mut file = std::fs::OpenOptions::new().append(true).open(&writer_path)?;
            writeln!(file, "appended line {}", i)?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut seen = 0;
    while let Some(line) = session.next().await {
        seen += 1;
        println!("  [{}]: {}", seen, line);
        if seen == 6 {
            session.stop().await;
        }
    }

    writer.await??;
    println!("\nStats: {:?}", session.stats());
    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
