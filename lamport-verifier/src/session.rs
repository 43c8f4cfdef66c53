//! Per-connection session reactor.
//!
//! Each admitted prover gets one task running [`run_session`]. That task owns
//! the [`VerifierSession`] and the write half of the socket; nothing else
//! touches either. A separate reader task turns the read half into a channel
//! of frames, because `read_frame` is not cancel-safe and the reactor selects
//! over several sources.

use std::io;
use std::net::SocketAddr;

use bytes::Bytes;
use lamport_core::{
    ResponseOutcome, SessionEvent, SessionEventKind, SessionId, TerminationReason, TickOutcome,
    VerifierPhase, VerifierSession,
};
use lamport_proto::{decode_hash, read_frame, write_challenge};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::scheduler::ChallengeScheduler;
use crate::server::{ControlError, ServerOptions};
use crate::shutdown::ShutdownSignal;

/// Operator command routed to a live session.
#[derive(Debug)]
pub(crate) enum Control {
    Start(oneshot::Sender<Result<(), ControlError>>),
    Stop(oneshot::Sender<Result<(), ControlError>>),
    Disconnect(oneshot::Sender<Result<(), ControlError>>),
}

impl Control {
    /// Reply as if no session were connected. Stop and disconnect are no-ops
    /// then, so only start fails.
    pub(crate) fn answer_without_session(self) {
        let (reply, result) = match self {
            Control::Start(reply) => (reply, Err(ControlError::NoSession)),
            Control::Stop(reply) | Control::Disconnect(reply) => (reply, Ok(())),
        };
        let _ = reply.send(result);
    }
}

/// Close the control channel and answer whatever was queued before the close.
fn refuse_pending(control: &mut mpsc::Receiver<Control>) {
    control.close();
    while let Ok(command) = control.try_recv() {
        command.answer_without_session();
    }
}

/// Whether the reactor keeps going after handling an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Spawn the read loop: frames in, one `Err` at the end.
fn spawn_reader(
    session: SessionId,
    mut read_half: OwnedReadHalf,
) -> (mpsc::Receiver<io::Result<Bytes>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(async move {
        loop {
            let frame = read_frame(&mut read_half).await;
            let failed = frame.is_err();
            if tx.send(frame).await.is_err() || failed {
                break;
            }
        }
        tracing::debug!(session = %session, "Read loop ended");
    });
    (rx, handle)
}

struct Reactor {
    session: VerifierSession,
    scheduler: ChallengeScheduler,
    writer: OwnedWriteHalf,
    events: broadcast::Sender<SessionEvent>,
}

impl Reactor {
    fn id(&self) -> SessionId {
        self.session.id()
    }

    fn emit(&self, kind: SessionEventKind) {
        // No subscribers is fine
        let _ = self.events.send(SessionEvent::new(self.id(), kind));
    }

    fn terminate(&mut self, reason: TerminationReason) {
        if self.session.terminate(reason).is_ok() {
            tracing::info!(session = %self.id(), reason = %reason, "Session terminated");
            self.emit(SessionEventKind::Terminated { reason });
        }
    }

    // ── Inbound frames ────────────────────────────────────────────────────

    fn on_frame(&mut self, frame: Bytes) -> Flow {
        let hash = match decode_hash(&frame) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(session = %self.id(), error = %e, "Ignoring malformed frame");
                return Flow::Continue;
            }
        };

        if self.session.phase() == VerifierPhase::AwaitingCommitment {
            if let Err(e) = self.session.receive_commitment(hash) {
                tracing::warn!(session = %self.id(), error = %e, "Commitment refused");
                return Flow::Continue;
            }
            tracing::info!(session = %self.id(), commitment = %hash, "Commitment received");
            self.emit(SessionEventKind::CommitmentReceived { commitment: hash });
            return Flow::Continue;
        }

        match self.session.receive_response(&hash) {
            Ok(ResponseOutcome::Accepted {
                challenge,
                complete,
            }) => {
                tracing::info!(session = %self.id(), challenge, "Response accepted");
                self.emit(SessionEventKind::VerificationResult {
                    challenge,
                    accepted: true,
                });
                if complete {
                    tracing::info!(session = %self.id(), "Authentication completed");
                    self.emit(SessionEventKind::AuthenticationCompleted);
                    return Flow::Close;
                }
                Flow::Continue
            }
            Ok(ResponseOutcome::Rejected { challenge }) => {
                tracing::warn!(session = %self.id(), challenge, "Response rejected");
                self.emit(SessionEventKind::VerificationResult {
                    challenge,
                    accepted: false,
                });
                self.emit_termination();
                Flow::Close
            }
            Ok(ResponseOutcome::Unsolicited) => {
                tracing::warn!(session = %self.id(), "Response with no challenge outstanding");
                self.emit_termination();
                Flow::Close
            }
            Err(e) => {
                tracing::warn!(session = %self.id(), error = %e, "Response ignored");
                Flow::Continue
            }
        }
    }

    /// Publish the reason for a termination the session already recorded.
    fn emit_termination(&self) {
        if let VerifierPhase::Terminated(reason) = self.session.phase() {
            tracing::info!(session = %self.id(), reason = %reason, "Session terminated");
            self.emit(SessionEventKind::Terminated { reason });
        }
    }

    // ── Scheduler ─────────────────────────────────────────────────────────

    async fn on_fire(&mut self) -> Flow {
        self.scheduler.disarm();
        match self.session.tick() {
            TickOutcome::Emit(challenge) => {
                if let Err(e) = write_challenge(&mut self.writer, challenge).await {
                    tracing::warn!(session = %self.id(), challenge, error = %e, "Failed to send challenge");
                    self.terminate(TerminationReason::Disconnected);
                    return Flow::Close;
                }
                tracing::info!(session = %self.id(), challenge, "Challenge sent");
                self.emit(SessionEventKind::ChallengeSent { challenge });
                Flow::Continue
            }
            TickOutcome::Complete => {
                tracing::info!(session = %self.id(), "Authentication completed");
                self.emit(SessionEventKind::AuthenticationCompleted);
                Flow::Close
            }
            TickOutcome::Idle | TickOutcome::AwaitingResponse => Flow::Continue,
        }
    }

    // ── Operator control ──────────────────────────────────────────────────

    fn on_control(&mut self, control: Control) -> Flow {
        match control {
            Control::Start(reply) => {
                let result = self.session.start().map_err(ControlError::from);
                if result.is_ok() {
                    tracing::info!(
                        session = %self.id(),
                        next_challenge = self.session.next_challenge(),
                        "Authentication started"
                    );
                    self.emit(SessionEventKind::AuthenticationStarted);
                }
                let _ = reply.send(result);
                Flow::Continue
            }
            Control::Stop(reply) => {
                if self.session.stop() {
                    tracing::info!(session = %self.id(), "Authentication stopped");
                    self.emit(SessionEventKind::AuthenticationStopped);
                }
                let _ = reply.send(Ok(()));
                Flow::Continue
            }
            Control::Disconnect(reply) => {
                self.terminate(TerminationReason::Disconnected);
                let _ = reply.send(Ok(()));
                Flow::Close
            }
        }
    }

    /// Close the transport after the session ends. The server reports
    /// `Disconnected` once the admission slot is free.
    async fn close(mut self, reader: JoinHandle<()>) {
        reader.abort();
        if let Err(e) = self.writer.shutdown().await {
            tracing::debug!(session = %self.id(), error = %e, "Socket shutdown failed");
        }
        tracing::info!(session = %self.id(), phase = ?self.session.phase(), "Connection closed");
    }
}

/// Drive one prover connection until the session ends.
pub(crate) async fn run_session(
    id: SessionId,
    stream: TcpStream,
    peer: SocketAddr,
    options: ServerOptions,
    mut control: mpsc::Receiver<Control>,
    events: broadcast::Sender<SessionEvent>,
    mut shutdown: ShutdownSignal,
) {
    let (read_half, writer) = stream.into_split();
    let mut reactor = Reactor {
        session: VerifierSession::with_id(id, options.chain_len),
        scheduler: ChallengeScheduler::new(options.interval),
        writer,
        events,
    };

    if let Err(e) = reactor.session.connect() {
        tracing::error!(session = %id, error = %e, "Fresh session refused connection");
        refuse_pending(&mut control);
        return;
    }
    tracing::info!(session = %id, peer = %peer, "Prover connected");
    reactor.emit(SessionEventKind::Connected { peer });

    let (mut inbound, reader) = spawn_reader(id, read_half);

    loop {
        let flow = tokio::select! {
            frame = inbound.recv() => match frame {
                Some(Ok(frame)) => reactor.on_frame(frame),
                Some(Err(e)) => {
                    if e.kind() == io::ErrorKind::UnexpectedEof {
                        tracing::info!(session = %id, "Prover closed the connection");
                    } else {
                        tracing::warn!(session = %id, error = %e, "Read failed");
                    }
                    reactor.terminate(TerminationReason::Disconnected);
                    Flow::Close
                }
                None => {
                    reactor.terminate(TerminationReason::Disconnected);
                    Flow::Close
                }
            },
            _ = reactor.scheduler.fired() => reactor.on_fire().await,
            command = control.recv() => match command {
                Some(command) => reactor.on_control(command),
                None => {
                    reactor.terminate(TerminationReason::Shutdown);
                    Flow::Close
                }
            },
            _ = shutdown.wait() => {
                reactor.terminate(TerminationReason::Shutdown);
                Flow::Close
            }
        };

        if flow == Flow::Close || reactor.session.is_terminal() {
            break;
        }
        let wanted = reactor.session.wants_tick();
        reactor.scheduler.sync(wanted);
    }

    refuse_pending(&mut control);
    reactor.scheduler.disarm();
    reactor.close(reader).await;
}
