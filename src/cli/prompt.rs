//! Console prompts

use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Print `message` and read one trimmed line from stdin
pub async fn read_line(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read from stdin")?;

    Ok(line.trim().to_string())
}

/// Block until enter is pressed (or stdin closes)
pub async fn pause(message: &str) -> Result<()> {
    read_line(message).await.map(|_| ())
}
