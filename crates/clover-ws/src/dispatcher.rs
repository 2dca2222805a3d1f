//! Inbound frame routing.
//!
//! Broadcast frames go to the subscription fan-out; acknowledgements go to the
//! correlator. Unknown message types and acks nobody is waiting for are
//! dropped so newer servers do not break older clients.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use clover_core::{ChatMessage, InboundFrame, Subscriptions};

use crate::correlator::Correlator;

/// What happened to one inbound text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Broadcast delivered to this many listeners.
    Broadcast(usize),
    /// Ack matched a waiter.
    Resolved(i64),
    /// Ack for a sequence id with no waiter.
    Unmatched(i64),
    /// Message type this client does not handle.
    Ignored(i64),
    /// Not a decodable frame.
    Malformed,
}

/// Route one text frame.
pub fn dispatch(
    text: &str,
    correlator: &Correlator,
    subscriptions: &Subscriptions<ChatMessage>,
) -> Dispatched {
    let frame = match InboundFrame::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, bytes = text.len(), "dropping undecodable frame");
            return Dispatched::Malformed;
        }
    };

    let outcome = match frame {
        InboundFrame::Broadcast(msg) => Dispatched::Broadcast(subscriptions.broadcast(msg)),
        InboundFrame::Acknowledgement(ack) => {
            let seq_id = ack.seq_id;
            if correlator.resolve(ack) {
                Dispatched::Resolved(seq_id)
            } else {
                Dispatched::Unmatched(seq_id)
            }
        }
        InboundFrame::Other(t) => Dispatched::Ignored(t),
    };
    tracing::debug!(?outcome, bytes = text.len(), "incoming frame");
    outcome
}

/// Read frames until the socket closes or errors, then fail outstanding waiters.
pub(crate) async fn receive_loop<S>(
    mut stream: S,
    correlator: Arc<Correlator>,
    subscriptions: Subscriptions<ChatMessage>,
) where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                dispatch(text.as_str(), &correlator, &subscriptions);
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "websocket closed by server");
                break;
            }
            Ok(_) => {} // binary / ping / pong
            Err(e) => {
                tracing::warn!(error = %e, "websocket receive error");
                break;
            }
        }
    }

    let failed = correlator.close();
    tracing::warn!(failed, "websocket receive loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    fn text(value: serde_json::Value) -> String {
        value.to_string()
    }

    #[tokio::test]
    async fn ack_resolves_matching_waiter_only() {
        let correlator = Arc::new(Correlator::new());
        let subs = Subscriptions::new();
        let pending = correlator.register(42).unwrap();

        let other = text(json!({"t": 2, "serverAck": {"seqId": 41, "apiCode": 0}}));
        assert_eq!(dispatch(&other, &correlator, &subs), Dispatched::Unmatched(41));

        let ours = text(json!({"t": 2, "serverAck": {"seqId": 42, "apiCode": 0, "data": "ok"}}));
        assert_eq!(dispatch(&ours, &correlator, &subs), Dispatched::Resolved(42));

        let ack = pending.wait(None).await.unwrap();
        assert_eq!(ack.get("data"), Some(&json!("ok")));
    }

    #[test]
    fn broadcast_reaches_subscribers_in_order() {
        let correlator = Correlator::new();
        let subs = Subscriptions::new();
        let (_, mut first) = subs.subscribe();
        let (_, mut second) = subs.subscribe();

        let frame = text(json!({"t": 1, "msg": {"messageId": "m1", "content": "hey"}}));
        assert_eq!(dispatch(&frame, &correlator, &subs), Dispatched::Broadcast(2));

        assert_eq!(first.try_recv().unwrap().message_id.as_deref(), Some("m1"));
        assert_eq!(second.try_recv().unwrap().content.as_deref(), Some("hey"));
    }

    #[test]
    fn unknown_and_malformed_frames_are_dropped() {
        let correlator = Correlator::new();
        let subs = Subscriptions::new();
        assert_eq!(
            dispatch(r#"{"t":40,"x":[]}"#, &correlator, &subs),
            Dispatched::Ignored(40)
        );
        assert_eq!(dispatch("{", &correlator, &subs), Dispatched::Malformed);
        assert_eq!(dispatch(r#"{"t":1}"#, &correlator, &subs), Dispatched::Malformed);
    }

    #[tokio::test]
    async fn loop_end_fails_outstanding_waiters() {
        let correlator = Arc::new(Correlator::new());
        let subs = Subscriptions::new();
        let pending = correlator.register(1).unwrap();

        let frames = stream::iter(vec![
            Ok(Message::Binary(vec![1, 2, 3])),
            Ok(Message::Text(text(json!({"t": 9})))),
            Ok(Message::Close(None)),
            Ok(Message::Text(text(json!({"t": 2, "serverAck": {"seqId": 1, "apiCode": 0}})))),
        ]);
        receive_loop(frames, Arc::clone(&correlator), subs).await;

        assert!(correlator.is_closed());
        assert!(matches!(
            pending.wait(None).await,
            Err(clover_core::CloverError::ConnectionClosed)
        ));
    }
}
