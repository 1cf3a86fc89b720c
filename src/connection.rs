//! The connection driver and its application-facing handles. One
//! [`Connection`] runs as a single task owning the transport, decoder, and
//! [`Session`]; every frame decode, state change, and write happens serially
//! there. [`Client`] is the clonable cross-thread surface: it posts commands
//! over an mpsc channel and reads coarse session state from shared atomics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::codec::Decoder;
use crate::error::{SessionError, StreamError};
use crate::frames::GoAwayStatus;
use crate::session::{Config, PushedStream, Request, Session};
use crate::settings::{Origin, SettingsStore};
use crate::stream::StreamEvent;

/// Transport reads land in one buffer of this size, compacted between
/// reads; the decoder keeps any trailing partial frame.
const INPUT_BUFFER_SIZE: usize = 64 * 1024;

enum Command {
    Queue {
        op_id: u64,
        request: Request,
        events: mpsc::UnboundedSender<StreamEvent>,
    },
    Cancel {
        op_id: u64,
    },
    Ping,
    Close {
        status: GoAwayStatus,
    },
    OnClose(oneshot::Sender<Result<(), SessionError>>),
}

#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    goaway: AtomicBool,
    active: AtomicBool,
    closed: AtomicBool,
    capacity: AtomicU32,
    latency_micros: AtomicU64,
}

/// Sets up a session over an already-connected transport. The returned
/// [`Connection`] must be spawned (or awaited) for anything to move.
pub fn connect<T>(
    transport: T,
    origin: Origin,
    config: Config,
    store: Arc<SettingsStore>,
) -> (Client, PushReceiver, Connection<T>)
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (push_tx, push_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        connected: AtomicBool::new(true),
        ..Shared::default()
    });

    let max_header_block_size = config.max_header_block_size();
    let session = Session::new(origin, config, store, push_tx);

    let client = Client {
        commands: commands_tx,
        shared: Arc::clone(&shared),
        next_op: Arc::new(AtomicU64::new(1)),
    };
    let pushes = PushReceiver { inner: push_rx };
    let connection = Connection {
        transport,
        session,
        decoder: Decoder::new(max_header_block_size),
        commands: commands_rx,
        shared,
        close_listeners: Vec::new(),
    };
    (client, pushes, connection)
}

/// Handle to a queued request. Events arrive in wire order; the final one
/// is always `StreamEvent::Closed`.
pub struct StreamHandle {
    op_id: u64,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    commands: mpsc::UnboundedSender<Command>,
}

impl StreamHandle {
    pub async fn event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Cancels the request: drops it if still queued, resets the stream
    /// with CANCEL if already on the wire.
    pub fn cancel(&self) {
        let _ = self.commands.send(Command::Cancel { op_id: self.op_id });
    }
}

/// Receiver for streams the server pushes at us.
pub struct PushReceiver {
    inner: mpsc::UnboundedReceiver<PushedStream>,
}

impl PushReceiver {
    pub async fn accept(&mut self) -> Option<PushedStream> {
        self.inner.recv().await
    }
}

/// Clonable application handle to a running session.
#[derive(Clone)]
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    next_op: Arc<AtomicU64>,
}

impl Client {
    /// Queues a request. The stream id is assigned by the session once
    /// concurrency permits.
    pub fn queue(&self, request: Request) -> StreamHandle {
        let op_id = self.next_op.fetch_add(1, Ordering::Relaxed);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        if self
            .commands
            .send(Command::Queue {
                op_id,
                request,
                events: events_tx.clone(),
            })
            .is_err()
        {
            let _ = events_tx.send(StreamEvent::Closed(Err(StreamError::Session(
                SessionError::Closed,
            ))));
        }
        StreamHandle {
            op_id,
            events: events_rx,
            commands: self.commands.clone(),
        }
    }

    /// Sends a liveness ping; the measured round trip shows up in
    /// [`Client::latency`] once echoed.
    pub fn ping(&self) {
        let _ = self.commands.send(Command::Ping);
    }

    /// Starts a graceful session-wide close.
    pub fn close(&self, status: GoAwayStatus) {
        let _ = self.commands.send(Command::Close { status });
    }

    /// Registers a close listener, resolved exactly once when the session
    /// terminates.
    pub fn on_close(&self) -> oneshot::Receiver<Result<(), SessionError>> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::OnClose(tx)).is_err() {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(Err(SessionError::Closed));
            return rx;
        }
        rx
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Relaxed) && !self.shared.closed.load(Ordering::Relaxed)
    }

    pub fn is_disconnected(&self) -> bool {
        !self.shared.connected.load(Ordering::Relaxed)
    }

    /// Connected and still accepting new streams.
    pub fn is_open(&self) -> bool {
        self.is_connected() && !self.shared.goaway.load(Ordering::Relaxed)
    }

    /// Connected, but the peer said GOAWAY; in-flight streams finish, new
    /// ones are refused.
    pub fn is_draining(&self) -> bool {
        self.is_connected() && self.shared.goaway.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    /// A reply has been received and the session is still open.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Relaxed) && self.is_open()
    }

    /// A reply was received at some point in this session's life.
    pub fn was_active(&self) -> bool {
        self.shared.active.load(Ordering::Relaxed)
    }

    /// Streams the peer would still let us open.
    pub fn capacity(&self) -> u32 {
        self.shared.capacity.load(Ordering::Relaxed)
    }

    /// Last measured ping round trip.
    pub fn latency(&self) -> Option<Duration> {
        match self.shared.latency_micros.load(Ordering::Relaxed) {
            0 => None,
            micros => Some(Duration::from_micros(micros)),
        }
    }
}

/// The single-task driver binding a [`Session`] to its transport.
pub struct Connection<T> {
    transport: T,
    session: Session,
    decoder: Decoder,
    commands: mpsc::UnboundedReceiver<Command>,
    shared: Arc<Shared>,
    close_listeners: Vec<oneshot::Sender<Result<(), SessionError>>>,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Drives the session until it terminates. Resolves with the session's
    /// terminal result after outbound frames are drained and the transport
    /// shut down.
    pub async fn run(self) -> Result<(), SessionError> {
        let Connection {
            mut transport,
            mut session,
            mut decoder,
            mut commands,
            shared,
            mut close_listeners,
        } = self;

        session.start();
        publish(&shared, &session);

        let mut read_buf = BytesMut::with_capacity(INPUT_BUFFER_SIZE);
        let result = loop {
            while let Some(frame) = session.take_outbound() {
                if let Err(err) = transport.write_all(&frame).await {
                    session.fail(err.into());
                    break;
                }
            }
            // Frames left over mean a write failed and the session is
            // already terminal; don't flush on top of the dead transport.
            if !session.has_outbound() {
                if let Err(err) = transport.flush().await {
                    session.fail(err.into());
                }
            }

            if let Some(result) = session.terminal() {
                break result.clone();
            }

            tokio::select! {
                read = transport.read_buf(&mut read_buf) => match read {
                    Ok(0) => session.on_transport_eof(),
                    Ok(_) => {
                        let feed = decoder.feed(&read_buf, &mut session);
                        read_buf.clear();
                        if let Err(err) = feed {
                            session.fatal_error(err);
                        }
                    }
                    Err(err) => session.fail(err.into()),
                },
                command = commands.recv() => match command {
                    Some(command) => {
                        handle_command(&mut session, &mut close_listeners, command);
                    }
                    None => {
                        // Every client handle is gone; nothing more can be
                        // queued, so wind the session down.
                        debug!("all handles dropped, closing session");
                        session.close(GoAwayStatus::OK);
                    }
                },
            }
            publish(&shared, &session);
        };

        // Best-effort drain so a final GOAWAY reaches the peer.
        while let Some(frame) = session.take_outbound() {
            if transport.write_all(&frame).await.is_err() {
                break;
            }
        }
        let _ = transport.flush().await;
        let _ = transport.shutdown().await;

        shared.connected.store(false, Ordering::Relaxed);
        shared.closed.store(true, Ordering::Relaxed);
        publish(&shared, &session);
        for listener in close_listeners {
            let _ = listener.send(result.clone());
        }
        trace!("connection finished");
        result
    }
}

fn handle_command(
    session: &mut Session,
    close_listeners: &mut Vec<oneshot::Sender<Result<(), SessionError>>>,
    command: Command,
) {
    match command {
        Command::Queue {
            op_id,
            request,
            events,
        } => session.queue(op_id, request, events),
        Command::Cancel { op_id } => session.cancel(op_id),
        Command::Ping => session.ping(),
        Command::Close { status } => session.close(status),
        Command::OnClose(listener) => close_listeners.push(listener),
    }
}

fn publish(shared: &Shared, session: &Session) {
    shared
        .goaway
        .store(session.received_goaway(), Ordering::Relaxed);
    if session.is_active() {
        shared.active.store(true, Ordering::Relaxed);
    }
    shared.capacity.store(session.capacity(), Ordering::Relaxed);
    if let Some(latency) = session.latency() {
        shared
            .latency_micros
            .store(latency.as_micros() as u64, Ordering::Relaxed);
    }
}
