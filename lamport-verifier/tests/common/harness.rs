//! Test harnesses for verifier E2E tests.
//!
//! Everything runs over loopback TCP on an ephemeral port with real time;
//! intervals are short so full sessions finish in well under a second.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use lamport_auth::{ChainHash, HashChain, Seed};
use lamport_core::{SessionEvent, SessionEventKind};
use lamport_proto::{decode_challenge, read_frame, write_frame, write_hash};
use lamport_verifier::{ServerOptions, VerifierHandle, VerifierServer};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

/// A verifier running on `127.0.0.1:<ephemeral>`.
pub struct TestVerifier {
    pub addr: SocketAddr,
    pub handle: VerifierHandle,
    events: broadcast::Receiver<SessionEvent>,
    task: JoinHandle<io::Result<()>>,
}

impl TestVerifier {
    pub async fn spawn(chain_len: u32, interval: Duration) -> Self {
        let options = ServerOptions {
            chain_len,
            interval,
        };
        let server = VerifierServer::bind("127.0.0.1:0", options)
            .await
            .expect("Failed to bind verifier");
        let addr = server.local_addr().expect("No local addr");
        let handle = server.handle();
        let events = server.subscribe();
        let task = tokio::spawn(server.run());

        Self {
            addr,
            handle,
            events,
            task,
        }
    }

    /// Next notification, failing the test after [`WAIT`].
    pub async fn next_event(&mut self) -> SessionEventKind {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("Timed out waiting for event")
            .expect("Event channel closed")
            .kind
    }

    /// Skip notifications until one matches, returning it.
    pub async fn wait_for(&mut self, matches: impl Fn(&SessionEventKind) -> bool) -> SessionEventKind {
        loop {
            let kind = self.next_event().await;
            if matches(&kind) {
                return kind;
            }
        }
    }

    /// Collect notifications up to and including the first that matches.
    pub async fn collect_until(
        &mut self,
        last: impl Fn(&SessionEventKind) -> bool,
    ) -> Vec<SessionEventKind> {
        let mut seen = Vec::new();
        loop {
            let kind = self.next_event().await;
            let done = last(&kind);
            seen.push(kind);
            if done {
                return seen;
            }
        }
    }

    /// Collect notifications up to and including `Disconnected`, which the
    /// server sends once the session's slot is free.
    pub async fn collect_until_disconnected(&mut self) -> Vec<SessionEventKind> {
        self.collect_until(|kind| *kind == SessionEventKind::Disconnected)
            .await
    }

    /// Notifications already queued, without waiting.
    pub fn drain(&mut self) -> Vec<SessionEventKind> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            seen.push(event.kind);
        }
        seen
    }

    /// Shut down and wait for the accept loop to exit.
    pub async fn shutdown(self) {
        self.handle.shutdown();
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("Verifier did not shut down")
            .expect("Verifier task panicked")
            .expect("Verifier returned an error");
    }
}

/// A hand-driven prover for misbehaving on purpose.
pub struct RawProver {
    pub stream: TcpStream,
    pub chain: HashChain,
}

impl RawProver {
    pub async fn connect(addr: SocketAddr, seed: &str, chain_len: u32) -> Self {
        let stream = TcpStream::connect(addr).await.expect("Failed to connect");
        let chain = HashChain::build(&Seed::from_text(seed), chain_len).unwrap();
        Self { stream, chain }
    }

    pub async fn commit(&mut self) {
        let commitment = *self.chain.tail();
        self.send(&commitment).await;
    }

    pub async fn send(&mut self, hash: &ChainHash) {
        write_hash(&mut self.stream, hash).await.expect("Failed to send hash");
    }

    pub async fn send_raw(&mut self, payload: &[u8]) {
        write_frame(&mut self.stream, payload).await.expect("Failed to send frame");
    }

    /// Next challenge index, or `None` once the verifier closed the stream.
    pub async fn read_challenge(&mut self) -> Option<u32> {
        let frame = tokio::time::timeout(WAIT, read_frame(&mut self.stream))
            .await
            .expect("Timed out waiting for challenge");
        frame.ok().map(|frame| decode_challenge(&frame).expect("Malformed challenge"))
    }

    /// The correct answer to `challenge`.
    pub fn otp(&self, challenge: u32) -> ChainHash {
        self.chain.links()[(self.chain.len() - challenge - 1) as usize]
    }
}

/// Indices of every `ChallengeSent` in order.
pub fn challenges_sent(events: &[SessionEventKind]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|kind| match kind {
            SessionEventKind::ChallengeSent { challenge } => Some(*challenge),
            _ => None,
        })
        .collect()
}

/// Indices of every accepted `VerificationResult` in order.
pub fn challenges_accepted(events: &[SessionEventKind]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|kind| match kind {
            SessionEventKind::VerificationResult {
                challenge,
                accepted: true,
            } => Some(*challenge),
            _ => None,
        })
        .collect()
}

pub fn is_commitment(kind: &SessionEventKind) -> bool {
    matches!(kind, SessionEventKind::CommitmentReceived { .. })
}
