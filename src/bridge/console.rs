//! Console data channel: replies go to stdout, one per line.
//!
//! Used by `parley chat` for local development, where stdin stands in for
//! the inbound side of the data channel.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{BridgeError, DataChannel};

/// Writes published payloads to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutChannel;

#[async_trait]
impl DataChannel for StdoutChannel {
    async fn publish(&self, payload: &[u8]) -> Result<(), BridgeError> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(payload)
            .await
            .map_err(|e| BridgeError::Publish(e.to_string()))?;
        stdout
            .write_all(b"\n")
            .await
            .map_err(|e| BridgeError::Publish(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| BridgeError::Publish(e.to_string()))
    }
}
