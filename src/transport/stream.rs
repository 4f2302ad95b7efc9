//! Framed MsgPack transport over any byte stream.
//!
//! Carries [`RawMessage`]s over an `AsyncRead`/`AsyncWrite` pair (a Unix
//! socket, a pipe, `tokio::io::duplex`) using the length-prefixed framing in
//! [`protocol`](crate::protocol).
//!
//! # Architecture
//!
//! ```text
//! send() ─┐
//! send() ─┼─► mpsc::Sender<WriteRequest> ─► Writer Task ─► write half
//! send() ─┘          ▲ oneshot outcome per request
//!
//! read half ─► Read Task ─► FrameBuffer ─► TransportEvent::MessageReceived
//! ```
//!
//! The writer task acknowledges every request individually, so a failed
//! write reaches the caller that issued it. When the read half hits EOF or
//! an unrecoverable framing error the transport turns unreachable and emits
//! [`TransportEvent::Deactivated`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, Semaphore};

use super::{event_channel, BoxFuture, EventReceiver, EventSender, Transport, TransportEvent};
use crate::codec::MsgPackCodec;
use crate::config::StreamConfig;
use crate::error::{BridgeError, Result};
use crate::protocol::{build_frame, FrameBuffer, RawMessage};
use crate::session::ActivationState;

/// Maximum requests written before a flush.
const MAX_BATCH_SIZE: usize = 64;

struct WriteRequest {
    frame: Bytes,
    done: oneshot::Sender<Result<()>>,
}

struct Shared {
    reachable: AtomicBool,
    activated: AtomicBool,
    events: EventSender,
}

impl Shared {
    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    /// Mark the link dead. Emits `Deactivated` once.
    fn shut_down(&self) {
        self.reachable.store(false, Ordering::Release);
        if self.activated.swap(false, Ordering::AcqRel) {
            self.emit(TransportEvent::Deactivated);
        }
    }
}

/// A transport over a byte stream.
#[derive(Clone)]
pub struct StreamTransport {
    tx: mpsc::Sender<WriteRequest>,
    shared: Arc<Shared>,
}

impl StreamTransport {
    /// Spawn reader and writer tasks over a split stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<R, W>(reader: R, writer: W, config: &StreamConfig) -> (Self, EventReceiver)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (events_tx, events_rx) = event_channel();
        let (tx, rx) = mpsc::channel(config.channel_capacity.clamp(1, Semaphore::MAX_PERMITS));
        let shared = Arc::new(Shared {
            reachable: AtomicBool::new(true),
            activated: AtomicBool::new(false),
            events: events_tx,
        });

        tokio::spawn(writer_loop(rx, writer, shared.clone()));
        tokio::spawn(read_loop(
            reader,
            shared.clone(),
            config.max_frame_size,
            config.read_buffer_size.max(1),
        ));

        (Self { tx, shared }, events_rx)
    }

    /// Spawn over a single bidirectional stream.
    pub fn from_stream<S>(stream: S, config: &StreamConfig) -> (Self, EventReceiver)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::spawn(reader, writer, config)
    }
}

impl Transport for StreamTransport {
    fn is_supported(&self) -> bool {
        true
    }

    fn activate(&self) {
        if !self.shared.reachable.load(Ordering::Acquire) {
            self.shared.emit(TransportEvent::ActivationComplete {
                state: ActivationState::NotActivated,
                error: Some("stream closed".into()),
            });
            return;
        }

        self.shared.activated.store(true, Ordering::Release);
        self.shared.emit(TransportEvent::ActivationComplete {
            state: ActivationState::Activated,
            error: None,
        });
    }

    fn is_reachable(&self) -> bool {
        self.shared.reachable.load(Ordering::Acquire)
    }

    fn send(&self, message: RawMessage) -> BoxFuture<'static, Result<()>> {
        let tx = self.tx.clone();
        let shared = self.shared.clone();

        Box::pin(async move {
            if !shared.activated.load(Ordering::Acquire) {
                return Err(BridgeError::TransmissionFailed(
                    "stream transport not activated".into(),
                ));
            }

            let payload = MsgPackCodec::encode_message(&message)?;
            let frame = build_frame(&payload)?;

            let (done, outcome) = oneshot::channel();
            tx.send(WriteRequest { frame, done })
                .await
                .map_err(|_| BridgeError::ConnectionClosed)?;
            outcome.await.map_err(|_| BridgeError::ConnectionClosed)?
        })
    }
}

/// Receive write requests, write them in batches, acknowledge each one.
async fn writer_loop<W>(mut rx: mpsc::Receiver<WriteRequest>, mut writer: W, shared: Arc<Shared>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(first) = rx.recv().await {
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(request) => batch.push(request),
                Err(_) => break,
            }
        }

        match write_batch(&mut writer, &batch).await {
            Ok(()) => {
                for request in batch {
                    let _ = request.done.send(Ok(()));
                }
            }
            Err(e) => {
                tracing::warn!("Stream write failed: {}", e);
                let detail = e.to_string();
                for request in batch {
                    let _ = request
                        .done
                        .send(Err(BridgeError::TransmissionFailed(detail.clone())));
                }
                shared.shut_down();
                return;
            }
        }
    }
}

async fn write_batch<W>(writer: &mut W, batch: &[WriteRequest]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for request in batch {
        writer.write_all(&request.frame).await?;
    }
    writer.flush().await
}

/// Read frames until EOF, emitting each decoded message.
///
/// Also stops once nobody holds the event receiver.
async fn read_loop<R>(mut reader: R, shared: Arc<Shared>, max_frame_size: u32, buffer_size: usize)
where
    R: AsyncRead + Unpin,
{
    let mut frames = FrameBuffer::with_max_frame_size(max_frame_size);
    let mut buf = vec![0u8; buffer_size];

    loop {
        let read = tokio::select! {
            read = reader.read(&mut buf) => read,
            _ = shared.events.closed() => {
                tracing::debug!("Event receiver dropped, stopping stream reader");
                break;
            }
        };

        let n = match read {
            Ok(0) => {
                tracing::debug!("Stream closed by peer");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Stream read failed: {}", e);
                break;
            }
        };

        let payloads = match frames.push(&buf[..n]) {
            Ok(payloads) => payloads,
            Err(e) => {
                tracing::error!("Dropping stream after framing error: {}", e);
                break;
            }
        };

        for payload in payloads {
            match MsgPackCodec::decode_message(&payload) {
                Ok(message) => shared.emit(TransportEvent::MessageReceived(message)),
                Err(e) => tracing::warn!("Skipping undecodable frame: {}", e),
            }
        }
    }

    shared.shut_down();
}
