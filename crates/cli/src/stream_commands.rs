use std::future::Future;

use {
    anyhow::Result,
    clap::Args,
    helix_channels::{DraftDestination, DraftStream},
    helix_config::HelixConfig,
    helix_telegram::TelegramDrafts,
    tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    tracing::{info, warn},
};

#[derive(Args)]
pub struct StreamArgs {
    /// Telegram account ID under `channels.telegram`.
    #[arg(long)]
    account: String,
    /// Chat ID to stream into.
    #[arg(long)]
    to: String,
    /// Forum topic (message thread) ID.
    #[arg(long)]
    thread: Option<String>,
    /// ID used in logs; defaults to the destination.
    #[arg(long)]
    stream_id: Option<String>,
}

pub async fn handle_stream(config: &HelixConfig, args: StreamArgs) -> Result<()> {
    let drafts = TelegramDrafts::from_config(&args.account, config)?;

    let mut destination = DraftDestination::new(args.to);
    if let Some(thread) = args.thread {
        destination = destination.with_thread(thread);
    }
    let mut builder = drafts.builder(destination);
    if let Some(stream_id) = args.stream_id {
        builder = builder.with_stream_id(stream_id);
    }
    let stream = builder.start();

    let interrupted = pump_lines(&stream, BufReader::new(tokio::io::stdin()), ctrl_c()).await?;
    if interrupted {
        warn!(stream_id = stream.stream_id(), "interrupted, stopping draft");
        stream.stop();
    }

    let outcome = stream.flush().await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if !outcome.delivered {
        anyhow::bail!("draft {} was not fully delivered", outcome.stream_id);
    }
    Ok(())
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available: never interrupt.
        std::future::pending::<()>().await;
    }
}

/// Feed `reader` into `stream` line by line as one growing text.
///
/// Returns `true` when `shutdown` fired before end of input.
async fn pump_lines<R>(
    stream: &DraftStream,
    reader: R,
    shutdown: impl Future<Output = ()>,
) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut text = String::new();
    let mut count = 0usize;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => return Ok(true),
            line = lines.next_line() => match line? {
                Some(line) => {
                    if count > 0 {
                        text.push('\n');
                    }
                    text.push_str(&line);
                    count += 1;
                    stream.update(&text);
                },
                None => break,
            },
        }
    }

    info!(
        stream_id = stream.stream_id(),
        lines = count,
        chars = text.chars().count(),
        "input finished"
    );
    Ok(false)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        helix_channels::{DraftChannel, MessageHandle},
        std::sync::{Arc, Mutex},
    };

    #[derive(Default)]
    struct LastText(Mutex<Vec<String>>);

    #[async_trait]
    impl DraftChannel for LastText {
        async fn send_new(
            &self,
            destination: &DraftDestination,
            text: &str,
        ) -> helix_channels::Result<MessageHandle> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(MessageHandle {
                destination: destination.clone(),
                message_id: "1".into(),
            })
        }

        async fn edit_existing(
            &self,
            _handle: &MessageHandle,
            text: &str,
        ) -> helix_channels::Result<()> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lines_accumulate_into_one_text() {
        let channel = Arc::new(LastText::default());
        let stream = DraftStream::builder(channel.clone(), DraftDestination::new("1")).start();

        let input: &[u8] = b"first\nsecond\nthird\n";
        let interrupted = pump_lines(&stream, input, std::future::pending())
            .await
            .unwrap();
        assert!(!interrupted);

        let outcome = stream.flush().await;
        assert!(outcome.delivered);
        assert_eq!(
            channel.0.lock().unwrap().last().unwrap(),
            "first\nsecond\nthird"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_reading() {
        let channel = Arc::new(LastText::default());
        let stream = DraftStream::builder(channel.clone(), DraftDestination::new("1")).start();

        let (_tx, rx) = tokio::io::duplex(64);
        let interrupted = pump_lines(&stream, BufReader::new(rx), async {})
            .await
            .unwrap();
        assert!(interrupted);
        stream.stop();
        assert!(!stream.flush().await.flushed);
        assert!(channel.0.lock().unwrap().is_empty());
    }
}
