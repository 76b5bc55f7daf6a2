//! Driver spawns and manages the link reader task.

use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::frame::FrameDecoder;
use crate::error::LinkError;
use crate::protocol::{self, FrameBody};
use crate::source::ByteSource;
use crate::telemetry::DeltaDecoder;

/// Sent back over the link when telemetry falls out of sequence; the
/// firmware answers with a full frame.
pub const RESYNC_REQUEST: &[u8] = b"F";

const EVENT_CAPACITY: usize = 256;
const MAX_SOURCE_ERRORS: u32 = 10;

/// One decoded unit from the link.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A validated frame: widened millisecond clock plus the typed body.
    Frame { millis: u64, body: FrameBody },
    /// Bytes that arrived outside any frame.
    Passthrough(Vec<u8>),
}

/// Result of spawning the driver task.
pub struct LinkChannels {
    /// Receiver for decoded link events.
    pub events: broadcast::Receiver<LinkEvent>,
    /// Sender for raw outbound bytes (commands to the firmware).
    pub outbound: mpsc::Sender<Vec<u8>>,
    /// Cancellation token for graceful shutdown.
    pub cancel: CancellationToken,
}

impl LinkChannels {
    /// A fresh event subscription as a `Stream`, for `StreamExt`
    /// combinators. Starts at the current stream position; lagged slots
    /// surface as stream errors.
    pub fn event_stream(&self) -> BroadcastStream<LinkEvent> {
        BroadcastStream::new(self.events.resubscribe())
    }
}

/// Driver owns the byte source and runs the decode pipeline.
pub struct Driver;

impl Driver {
    /// Spawn the reader task for the given source.
    ///
    /// Returns a broadcast receiver for decoded events, an outbound byte
    /// channel and a cancellation token.
    pub fn spawn<S>(source: S) -> LinkChannels
    where
        S: ByteSource,
    {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();

        let cancel_reader = cancel.clone();
        tokio::spawn(async move {
            Self::reader_task(source, event_tx, outbound_rx, cancel_reader).await;
        });

        LinkChannels {
            events: event_rx,
            outbound: outbound_tx,
            cancel,
        }
    }

    async fn reader_task<S>(
        mut source: S,
        event_tx: broadcast::Sender<LinkEvent>,
        mut outbound_rx: mpsc::Receiver<Vec<u8>>,
        cancel: CancellationToken,
    ) where
        S: ByteSource,
    {
        info!("link reader task started");
        let mut frames = FrameDecoder::new();
        let mut telemetry = DeltaDecoder::new();
        let mut millis: u64 = 0;
        let mut frame_count = 0u64;
        let mut checksum_failures = 0u64;
        let mut error_count = 0u32;

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("link reader cancelled");
                    break;
                }
                Some(bytes) = outbound_rx.recv() => {
                    if let Err(e) = source.send(&bytes).await {
                        warn!("outbound write failed: {}", e);
                    }
                    continue;
                }
                chunk = source.next_chunk() => chunk,
            };

            match chunk {
                Ok(Some(bytes)) => {
                    error_count = 0;
                    let mut rest = &bytes[..];
                    while !rest.is_empty() {
                        let outcome = frames.feed(rest);
                        rest = &rest[outcome.consumed..];

                        if !outcome.passthrough.is_empty()
                            && event_tx
                                .send(LinkEvent::Passthrough(outcome.passthrough))
                                .is_err()
                        {
                            debug!("all receivers dropped, shutting down");
                            return;
                        }

                        match outcome.frame {
                            None => {}
                            Some(Err(e)) => {
                                checksum_failures += 1;
                                warn!("dropped frame: {}", e);
                            }
                            Some(Ok(frame)) => {
                                frame_count += 1;
                                let mut bits = frame.bits();
                                let header = protocol::read_header(&mut bits);
                                millis = protocol::extend_millis(millis, header.raw_millis);

                                match protocol::parse_body(&header, &mut bits, &mut telemetry) {
                                    Ok(body) => {
                                        trace!(
                                            "frame {}: millis={}, type={:?}",
                                            frame_count, millis, header.frame_type
                                        );
                                        if event_tx
                                            .send(LinkEvent::Frame { millis, body })
                                            .is_err()
                                        {
                                            debug!("all receivers dropped, shutting down");
                                            return;
                                        }
                                    }
                                    Err(e @ LinkError::Desync { .. }) => {
                                        warn!("telemetry desync, requesting full frame: {}", e);
                                        if let Err(e) = source.send(RESYNC_REQUEST).await {
                                            warn!("resync request failed: {}", e);
                                        }
                                    }
                                    Err(e) => {
                                        warn!("unparseable frame body: {}", e);
                                    }
                                }
                            }
                        }
                    }
                }
                Ok(None) => {
                    info!(
                        "link closed after {} frames ({} checksum failures)",
                        frame_count, checksum_failures
                    );
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    error!("source error ({}/{}): {}", error_count, MAX_SOURCE_ERRORS, e);
                    if error_count >= MAX_SOURCE_ERRORS {
                        error!("too many source errors, shutting down");
                        break;
                    }
                    let backoff =
                        std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!("link reader task ended (processed {} frames)", frame_count);
    }
}
