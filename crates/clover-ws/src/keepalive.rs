//! Fixed-interval keepalive pings.

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use clover_core::OutboundRequest;

use crate::writer::FrameWriter;

/// Send a fire-and-forget ping every `period` until cancelled or a write fails.
///
/// No pong is awaited; the server keeping the socket open is the only signal.
pub(crate) async fn ping_loop(writer: FrameWriter, period: Duration) {
    let frame = match OutboundRequest::ping().to_text() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "cannot encode ping frame");
            return;
        }
    };

    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = writer.send_text(frame.clone()).await {
            tracing::warn!(error = %e, "keepalive ping failed, stopping");
            return;
        }
        tracing::trace!("keepalive ping sent");
    }
}
