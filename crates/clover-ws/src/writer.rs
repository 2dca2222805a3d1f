//! Serialized write half of the socket.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Sink, SinkExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

use clover_core::CloverError;

type BoxSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

/// Shared handle to the socket's write half. Callers and the pinger write
/// through the same mutex, so frames never interleave.
///
/// Once the connection's teardown token fires, queued and in-flight writes
/// give up with `ConnectionClosed` instead of waiting on a peer that has
/// stopped reading.
#[derive(Clone)]
pub(crate) struct FrameWriter {
    sink: Arc<Mutex<BoxSink>>,
    teardown: CancellationToken,
}

impl FrameWriter {
    pub(crate) fn new<S>(sink: S, teardown: CancellationToken) -> Self
    where
        S: Sink<Message, Error = WsError> + Send + 'static,
    {
        let sink: BoxSink = Box::pin(sink);
        Self {
            sink: Arc::new(Mutex::new(sink)),
            teardown,
        }
    }

    pub(crate) async fn send_text(&self, text: String) -> Result<(), CloverError> {
        if self.teardown.is_cancelled() {
            return Err(CloverError::ConnectionClosed);
        }
        let write = async {
            self.sink
                .lock()
                .await
                .send(Message::Text(text.into()))
                .await
                .map_err(|e| CloverError::Connection(format!("websocket send failed: {e}")))
        };
        tokio::select! {
            biased;
            _ = self.teardown.cancelled() => Err(CloverError::ConnectionClosed),
            result = write => result,
        }
    }

    /// Flush and send the close frame. Not bound to the teardown token,
    /// which has normally fired by the time this runs.
    pub(crate) async fn close(&self) -> Result<(), CloverError> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| CloverError::Connection(format!("websocket close failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::sink;
    use std::time::Duration;

    /// A sink that accepts nothing, like a peer that never reads.
    fn stalled() -> impl Sink<Message, Error = WsError> + Send + 'static {
        sink::unfold((), |(), _msg: Message| async {
            futures::future::pending::<()>().await;
            Ok::<_, WsError>(())
        })
    }

    #[tokio::test]
    async fn teardown_releases_a_stalled_write() {
        let token = CancellationToken::new();
        let writer = FrameWriter::new(stalled(), token.clone());

        let blocked = tokio::spawn({
            let writer = writer.clone();
            async move { writer.send_text("a".into()).await }
        });
        let queued = tokio::spawn({
            let writer = writer.clone();
            async move { writer.send_text("b".into()).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        token.cancel();
        let blocked = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("stalled write must return after teardown")
            .unwrap();
        let queued = tokio::time::timeout(Duration::from_secs(1), queued)
            .await
            .expect("queued write must return after teardown")
            .unwrap();
        assert!(matches!(blocked, Err(CloverError::ConnectionClosed)));
        assert!(matches!(queued, Err(CloverError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn writes_after_teardown_fail_fast() {
        let token = CancellationToken::new();
        let writer = FrameWriter::new(stalled(), token.clone());
        token.cancel();
        assert!(matches!(
            writer.send_text("late".into()).await,
            Err(CloverError::ConnectionClosed)
        ));
    }
}
