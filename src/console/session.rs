//! Line-oriented console session.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::command::{handle_line, Reply};
use crate::error::Result;
use crate::ratelimit::RateLimiter;

/// Serves console requests against one shared limiter.
pub struct Session {
    /// The rate limiter instance
    rate_limiter: Arc<RateLimiter>,
}

impl Session {
    /// Create a new session over the given rate limiter.
    pub fn new(rate_limiter: Arc<RateLimiter>) -> Self {
        Self { rate_limiter }
    }

    /// Serve requests until the reader reaches end of input.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.serve_with_shutdown(reader, writer, std::future::pending())
            .await
    }

    /// Serve requests until end of input or until `signal` resolves.
    ///
    /// Returns the number of replies written.
    pub async fn serve_with_shutdown<R, W, F>(
        &self,
        reader: R,
        mut writer: W,
        signal: F,
    ) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        info!(
            strategy = %self.rate_limiter.policy().strategy,
            "Console session started"
        );

        let mut lines = reader.lines();
        let mut replies = 0;
        tokio::pin!(signal);

        loop {
            let line = tokio::select! {
                _ = &mut signal => {
                    info!("Shutdown requested, closing console session");
                    break;
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                debug!("End of input");
                break;
            };

            if let Some(reply) = handle_line(&self.rate_limiter, &line) {
                write_reply(&mut writer, &reply).await?;
                replies += 1;
            }
        }

        writer.flush().await?;
        info!(replies = replies, keys = self.rate_limiter.key_count(), "Console session finished");
        Ok(replies)
    }
}

async fn write_reply<W>(writer: &mut W, reply: &Reply) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded =
        serde_json::to_vec(reply).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Periodically evict idle keys in the background.
///
/// Returns `None` when the limiter has no idle TTL, since sweeping would
/// never remove anything.
pub fn spawn_idle_sweeper(
    rate_limiter: Arc<RateLimiter>,
    every: Duration,
) -> Option<JoinHandle<()>> {
    let ttl = rate_limiter.policy().idle_ttl?;
    info!(ttl = ?ttl, every = ?every, "Starting idle key sweeper");

    Some(tokio::spawn(async move {
        let start = tokio::time::Instant::now() + every;
        let mut ticker = tokio::time::interval_at(start, every);
        loop {
            ticker.tick().await;
            rate_limiter.sweep_idle();
        }
    }))
}
