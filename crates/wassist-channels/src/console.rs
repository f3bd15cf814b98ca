use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use wassist_core::connectors::Messenger;
use wassist_core::DeliveryError;

/// Writes replies to a terminal instead of WhatsApp. Used by `wassist chat`.
pub struct ConsoleMessenger<W = tokio::io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleMessenger {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> ConsoleMessenger<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> Messenger for ConsoleMessenger<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, to: &str, text: &str) -> Result<(), DeliveryError> {
        let line = format!("\n[bot → {to}]\n{text}\n> ");
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes())
            .await
            .map_err(|e| DeliveryError::Failed(e.to_string()))?;
        out.flush()
            .await
            .map_err(|e| DeliveryError::Failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_reply_with_recipient() {
        let console = ConsoleMessenger::new(Vec::<u8>::new());
        console.send("local:me", "hello").await.unwrap();
        let written = String::from_utf8(console.into_inner()).unwrap();
        assert!(written.contains("[bot → local:me]\nhello\n"));
    }
}
