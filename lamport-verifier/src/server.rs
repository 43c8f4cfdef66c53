//! Verifier accept loop with single-session admission.
//!
//! The server owns the listener and at most one live session. Connections
//! that arrive while a session is live are closed straight away; the live
//! session is not disturbed.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use lamport_core::{InvalidTransition, SessionEvent, SessionEventKind, SessionId, Settings};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::session::{run_session, Control};
use crate::shutdown::{Shutdown, ShutdownSignal};

/// Capacity of the notification channel. Slow subscribers lag rather than
/// stall the session.
const EVENT_CAPACITY: usize = 256;

/// Errors returned to operator commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ControlError {
    #[error("no prover connected")]
    NoSession,

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error("verifier is not running")]
    ServerGone,
}

/// Session parameters the server hands to every admitted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Chain length `n`; challenges run `1..n`.
    pub chain_len: u32,
    /// Delay before each challenge.
    pub interval: Duration,
}

impl ServerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            chain_len: settings.chain_len,
            interval: settings.interval(),
        }
    }
}

#[derive(Debug)]
enum Command {
    Start(oneshot::Sender<Result<(), ControlError>>),
    Stop(oneshot::Sender<Result<(), ControlError>>),
    Disconnect(oneshot::Sender<Result<(), ControlError>>),
}

/// Cloneable handle for operator control.
#[derive(Debug, Clone)]
pub struct VerifierHandle {
    commands: mpsc::Sender<Command>,
    shutdown: Shutdown,
}

impl VerifierHandle {
    async fn request(
        &self,
        make: fn(oneshot::Sender<Result<(), ControlError>>) -> Command,
    ) -> Result<(), ControlError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| ControlError::ServerGone)?;
        rx.await.map_err(|_| ControlError::ServerGone)?
    }

    /// Begin or resume challenging the connected prover.
    ///
    /// # Errors
    ///
    /// `NoSession` without a prover, `Transition` if the session is not
    /// idle (no commitment yet, already challenging, or ended).
    pub async fn start(&self) -> Result<(), ControlError> {
        self.request(Command::Start).await
    }

    /// Pause challenging. `Ok` even when nothing is running.
    pub async fn stop(&self) -> Result<(), ControlError> {
        self.request(Command::Stop).await
    }

    /// Drop the connected prover. `Ok` even when none is connected.
    pub async fn disconnect(&self) -> Result<(), ControlError> {
        self.request(Command::Disconnect).await
    }

    /// Stop accepting and end the live session.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }
}

/// The live session's control channel and task.
struct LiveSession {
    id: SessionId,
    control: mpsc::Sender<Control>,
    task: JoinHandle<()>,
}

/// Resolves when the live session's task ends; pends forever without one.
async fn session_finished(slot: &mut Option<LiveSession>) -> Result<(), tokio::task::JoinError> {
    match slot {
        Some(live) => (&mut live.task).await,
        None => std::future::pending().await,
    }
}

/// TCP verifier server.
pub struct VerifierServer {
    listener: TcpListener,
    options: ServerOptions,
    events: broadcast::Sender<SessionEvent>,
    commands_tx: mpsc::Sender<Command>,
    commands_rx: mpsc::Receiver<Command>,
    shutdown: Shutdown,
}

impl VerifierServer {
    /// Bind the listener.
    ///
    /// # Errors
    ///
    /// Any bind failure, e.g. address in use.
    pub async fn bind(addr: impl ToSocketAddrs, options: ServerOptions) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (commands_tx, commands_rx) = mpsc::channel(16);
        Ok(Self {
            listener,
            options,
            events,
            commands_tx,
            commands_rx,
            shutdown: Shutdown::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Subscribe to session notifications. Events sent before subscribing
    /// are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn handle(&self) -> VerifierHandle {
        VerifierHandle {
            commands: self.commands_tx.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Accept connections until shutdown.
    ///
    /// On shutdown the live session is terminated and awaited before this
    /// returns.
    pub async fn run(mut self) -> io::Result<()> {
        let local = self.listener.local_addr()?;
        tracing::info!(addr = %local, chain_len = self.options.chain_len, "Verifier listening");

        let mut signal = self.shutdown.signal();
        let mut slot: Option<LiveSession> = None;

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };
                    if let Some(live) = &slot {
                        tracing::warn!(peer = %peer, live = %live.id, "Rejecting connection while a session is live");
                        drop(stream);
                        let _ = self.events.send(SessionEvent::new(
                            SessionId::new(),
                            SessionEventKind::ConnectionRejected { peer },
                        ));
                        continue;
                    }
                    slot = Some(self.admit(stream, peer, signal.clone()));
                }
                Some(command) = self.commands_rx.recv() => {
                    route(slot.as_ref(), command).await;
                }
                result = session_finished(&mut slot) => {
                    if let Some(live) = slot.take() {
                        self.release(live.id, result);
                    }
                }
                _ = signal.wait() => {
                    tracing::info!("Verifier shutting down");
                    break;
                }
            }
        }

        if let Some(live) = slot.take() {
            drop(live.control);
            let result = live.task.await;
            self.release(live.id, result);
        }
        Ok(())
    }

    /// Report a finished session. Called after its slot is cleared.
    fn release(&self, id: SessionId, result: Result<(), tokio::task::JoinError>) {
        match result {
            Ok(()) => tracing::debug!(session = %id, "Session slot freed"),
            Err(e) => tracing::error!(session = %id, error = %e, "Session task failed"),
        }
        let _ = self
            .events
            .send(SessionEvent::new(id, SessionEventKind::Disconnected));
    }

    fn admit(
        &self,
        stream: tokio::net::TcpStream,
        peer: SocketAddr,
        signal: ShutdownSignal,
    ) -> LiveSession {
        let id = SessionId::new();
        let (control, control_rx) = mpsc::channel(8);
        let task = tokio::spawn(run_session(
            id,
            stream,
            peer,
            self.options.clone(),
            control_rx,
            self.events.clone(),
            signal,
        ));
        LiveSession { id, control, task }
    }
}

/// Forward an operator command to the live session, or answer it directly.
async fn route(live: Option<&LiveSession>, command: Command) {
    let control = match command {
        Command::Start(reply) => Control::Start(reply),
        Command::Stop(reply) => Control::Stop(reply),
        Command::Disconnect(reply) => Control::Disconnect(reply),
    };

    let Some(live) = live else {
        control.answer_without_session();
        return;
    };

    // The session may have ended between admission and now
    if let Err(mpsc::error::SendError(control)) = live.control.send(control).await {
        control.answer_without_session();
    }
}
