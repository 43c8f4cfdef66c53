//! End-to-end tests for verifier sessions.
//!
//! A real `VerifierServer` on loopback, driven either by the real prover
//! (`lamport_prover::run_session`) or by a hand-written one that misbehaves.

mod common;

use std::time::Duration;

use common::{
    challenges_accepted, challenges_sent, is_commitment, RawProver, TestVerifier, WAIT,
};
use lamport_auth::{HashChain, Seed};
use lamport_core::{SessionEventKind, TerminationReason};
use lamport_prover::{run_session, ProverClient, ProverReport};
use lamport_verifier::ControlError;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

const FAST: Duration = Duration::from_millis(20);

fn spawn_prover(
    addr: std::net::SocketAddr,
    seed: &'static str,
    chain_len: u32,
) -> JoinHandle<anyhow::Result<ProverReport>> {
    tokio::spawn(async move {
        let client = ProverClient::connect(addr).await?;
        run_session(client, chain_len, Seed::from_text(seed)).await
    })
}

async fn join_prover(task: JoinHandle<anyhow::Result<ProverReport>>) -> anyhow::Result<ProverReport> {
    tokio::time::timeout(WAIT, task)
        .await
        .expect("Prover did not finish")
        .expect("Prover task panicked")
}

// ============================================================================
// Happy Path
// ============================================================================

#[tokio::test]
async fn test_real_prover_completes_every_challenge() {
    let mut verifier = TestVerifier::spawn(5, FAST).await;
    let prover = spawn_prover(verifier.addr, "seed", 5);

    assert!(matches!(
        verifier.next_event().await,
        SessionEventKind::Connected { .. }
    ));
    let chain = HashChain::build(&Seed::from_text("seed"), 5).unwrap();
    assert_eq!(
        verifier.next_event().await,
        SessionEventKind::CommitmentReceived {
            commitment: *chain.tail()
        }
    );

    verifier.handle.start().await.unwrap();
    let events = verifier.collect_until_disconnected().await;

    assert_eq!(events[0], SessionEventKind::AuthenticationStarted);
    assert_eq!(challenges_sent(&events), vec![1, 2, 3, 4]);
    assert_eq!(challenges_accepted(&events), vec![1, 2, 3, 4]);
    assert_eq!(
        &events[events.len() - 2..],
        &[
            SessionEventKind::AuthenticationCompleted,
            SessionEventKind::Disconnected
        ]
    );

    let report = join_prover(prover).await.unwrap();
    assert_eq!(report.challenges_answered, 4);

    verifier.shutdown().await;
}

#[tokio::test]
async fn test_challenge_and_result_alternate() {
    let mut verifier = TestVerifier::spawn(4, FAST).await;
    let prover = spawn_prover(verifier.addr, "alternate", 4);
    verifier.wait_for(is_commitment).await;

    verifier.handle.start().await.unwrap();
    let events = verifier.collect_until_disconnected().await;

    let exchanges: Vec<&SessionEventKind> = events
        .iter()
        .filter(|kind| {
            matches!(
                kind,
                SessionEventKind::ChallengeSent { .. } | SessionEventKind::VerificationResult { .. }
            )
        })
        .collect();
    for pair in exchanges.chunks(2) {
        match pair {
            [SessionEventKind::ChallengeSent { challenge: sent }, SessionEventKind::VerificationResult { challenge, accepted: true }] => {
                assert_eq!(sent, challenge)
            }
            other => panic!("Unexpected exchange: {:?}", other),
        }
    }

    join_prover(prover).await.unwrap();
    verifier.shutdown().await;
}

#[tokio::test]
async fn test_longer_prover_chain_still_verifies() {
    let mut verifier = TestVerifier::spawn(4, FAST).await;
    let prover = spawn_prover(verifier.addr, "long", 9);
    verifier.wait_for(is_commitment).await;

    verifier.handle.start().await.unwrap();
    let events = verifier.collect_until_disconnected().await;

    assert_eq!(challenges_accepted(&events), vec![1, 2, 3]);
    assert!(events.contains(&SessionEventKind::AuthenticationCompleted));
    assert_eq!(join_prover(prover).await.unwrap().challenges_answered, 3);

    verifier.shutdown().await;
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_wrong_response_terminates_and_closes() {
    let mut verifier = TestVerifier::spawn(5, FAST).await;
    let mut prover = RawProver::connect(verifier.addr, "seed", 5).await;
    prover.commit().await;
    verifier.wait_for(is_commitment).await;

    verifier.handle.start().await.unwrap();
    assert_eq!(prover.read_challenge().await, Some(1));

    // h3 answers challenge 2, not challenge 1
    let h3 = prover.chain.links()[2];
    prover.send(&h3).await;

    let events = verifier.collect_until_disconnected().await;
    assert!(events.contains(&SessionEventKind::VerificationResult {
        challenge: 1,
        accepted: false
    }));
    assert!(events.contains(&SessionEventKind::Terminated {
        reason: TerminationReason::VerificationFailed
    }));
    assert!(!events.contains(&SessionEventKind::AuthenticationCompleted));

    assert_eq!(prover.read_challenge().await, None);

    verifier.shutdown().await;
}

#[tokio::test]
async fn test_unsolicited_response_terminates() {
    let mut verifier = TestVerifier::spawn(5, FAST).await;
    let mut prover = RawProver::connect(verifier.addr, "seed", 5).await;
    prover.commit().await;
    verifier.wait_for(is_commitment).await;

    let speculative = prover.otp(1);
    prover.send(&speculative).await;

    let events = verifier.collect_until_disconnected().await;
    assert!(events.contains(&SessionEventKind::Terminated {
        reason: TerminationReason::UnsolicitedResponse
    }));
    assert_eq!(prover.read_challenge().await, None);

    verifier.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frames_are_ignored() {
    let mut verifier = TestVerifier::spawn(3, FAST).await;
    let mut prover = RawProver::connect(verifier.addr, "seed", 3).await;

    prover.send_raw(b"not a hash").await;
    prover.send_raw(&[b'Z'; 64]).await;
    prover.commit().await;

    let commitment = *prover.chain.tail();
    assert_eq!(
        verifier.wait_for(is_commitment).await,
        SessionEventKind::CommitmentReceived { commitment }
    );

    verifier.handle.start().await.unwrap();
    assert_eq!(prover.read_challenge().await, Some(1));
    prover.send_raw(b"garbage").await;
    let otp = prover.otp(1);
    prover.send(&otp).await;
    assert_eq!(prover.read_challenge().await, Some(2));

    verifier.shutdown().await;
}

#[tokio::test]
async fn test_shorter_prover_chain_disconnects() {
    let mut verifier = TestVerifier::spawn(5, FAST).await;
    let prover = spawn_prover(verifier.addr, "short", 3);
    verifier.wait_for(is_commitment).await;

    verifier.handle.start().await.unwrap();
    let events = verifier.collect_until_disconnected().await;

    assert_eq!(challenges_accepted(&events), vec![1, 2]);
    assert!(events.contains(&SessionEventKind::Terminated {
        reason: TerminationReason::Disconnected
    }));
    assert!(join_prover(prover).await.is_err());

    verifier.shutdown().await;
}

// ============================================================================
// Pacing
// ============================================================================

#[tokio::test]
async fn test_no_new_challenge_while_response_outstanding() {
    let mut verifier = TestVerifier::spawn(5, FAST).await;
    let mut prover = RawProver::connect(verifier.addr, "seed", 5).await;
    prover.commit().await;
    verifier.wait_for(is_commitment).await;

    verifier.handle.start().await.unwrap();
    assert_eq!(prover.read_challenge().await, Some(1));

    // Many intervals pass with challenge 1 unanswered
    let early = tokio::time::timeout(
        Duration::from_millis(300),
        lamport_proto::read_frame(&mut prover.stream),
    )
    .await;
    assert!(early.is_err(), "challenge sent before the response: {:?}", early);
    assert_eq!(challenges_sent(&verifier.drain()), vec![1]);

    let otp = prover.otp(1);
    prover.send(&otp).await;
    assert_eq!(prover.read_challenge().await, Some(2));

    verifier.shutdown().await;
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn test_second_connection_rejected_while_first_completes() {
    let mut verifier = TestVerifier::spawn(6, Duration::from_millis(100)).await;
    let prover = spawn_prover(verifier.addr, "first", 6);
    verifier.wait_for(is_commitment).await;
    verifier.handle.start().await.unwrap();

    let mut intruder = TcpStream::connect(verifier.addr).await.unwrap();
    let closed = tokio::time::timeout(WAIT, lamport_proto::read_frame(&mut intruder))
        .await
        .expect("Rejected connection was left open");
    assert!(closed.is_err());

    let events = verifier.collect_until_disconnected().await;
    assert!(events
        .iter()
        .any(|kind| matches!(kind, SessionEventKind::ConnectionRejected { .. })));
    assert_eq!(challenges_sent(&events), vec![1, 2, 3, 4, 5]);
    assert_eq!(challenges_accepted(&events), vec![1, 2, 3, 4, 5]);
    assert!(events.contains(&SessionEventKind::AuthenticationCompleted));

    join_prover(prover).await.unwrap();
    verifier.shutdown().await;
}

#[tokio::test]
async fn test_slot_freed_after_session_ends() {
    let mut verifier = TestVerifier::spawn(2, FAST).await;

    let first = spawn_prover(verifier.addr, "one", 2);
    verifier.wait_for(is_commitment).await;
    verifier.handle.start().await.unwrap();
    verifier.collect_until_disconnected().await;
    join_prover(first).await.unwrap();

    let second = spawn_prover(verifier.addr, "two", 2);
    assert!(matches!(
        verifier.next_event().await,
        SessionEventKind::Connected { .. }
    ));
    verifier.wait_for(is_commitment).await;
    verifier.handle.start().await.unwrap();
    let events = verifier.collect_until_disconnected().await;
    assert_eq!(challenges_accepted(&events), vec![1]);
    join_prover(second).await.unwrap();

    verifier.shutdown().await;
}

// ============================================================================
// Operator Control
// ============================================================================

#[tokio::test]
async fn test_stop_pauses_and_start_resumes() {
    let mut verifier = TestVerifier::spawn(6, Duration::from_millis(100)).await;
    let prover = spawn_prover(verifier.addr, "pause", 6);
    verifier.wait_for(is_commitment).await;

    verifier.handle.start().await.unwrap();
    let mut before = verifier
        .collect_until(|kind| {
            *kind
                == SessionEventKind::VerificationResult {
                    challenge: 2,
                    accepted: true,
                }
        })
        .await;

    verifier.handle.stop().await.unwrap();
    verifier.handle.stop().await.unwrap();
    before.extend(
        verifier
            .collect_until(|kind| *kind == SessionEventKind::AuthenticationStopped)
            .await,
    );

    tokio::time::sleep(Duration::from_millis(400)).await;
    let paused = verifier.drain();
    assert!(challenges_sent(&paused).is_empty(), "challenged while stopped: {:?}", paused);
    assert!(!paused.contains(&SessionEventKind::AuthenticationStopped));

    verifier.handle.start().await.unwrap();
    let after = verifier.collect_until_disconnected().await;

    let all: Vec<_> = before.into_iter().chain(paused).chain(after).collect();
    assert_eq!(challenges_sent(&all), vec![1, 2, 3, 4, 5]);
    assert_eq!(challenges_accepted(&all), vec![1, 2, 3, 4, 5]);
    assert_eq!(join_prover(prover).await.unwrap().challenges_answered, 5);

    verifier.shutdown().await;
}

#[tokio::test]
async fn test_controls_racing_session_end_never_fail() {
    for _ in 0..20 {
        let mut verifier = TestVerifier::spawn(2, Duration::from_millis(5)).await;
        let mut prover = RawProver::connect(verifier.addr, "race", 2).await;
        prover.commit().await;
        verifier.wait_for(is_commitment).await;

        verifier.handle.start().await.unwrap();
        assert_eq!(prover.read_challenge().await, Some(1));
        let otp = prover.otp(1);
        prover.send(&otp).await;

        // Answering challenge 1 completes the session while these are in flight
        for _ in 0..50 {
            assert_eq!(verifier.handle.stop().await, Ok(()));
        }
        assert_eq!(verifier.handle.disconnect().await, Ok(()));

        verifier.collect_until_disconnected().await;
        assert_eq!(verifier.handle.stop().await, Ok(()));
        verifier.shutdown().await;
    }
}

#[tokio::test]
async fn test_start_before_commitment_fails() {
    let mut verifier = TestVerifier::spawn(3, FAST).await;
    let _prover = RawProver::connect(verifier.addr, "seed", 3).await;
    assert!(matches!(
        verifier.next_event().await,
        SessionEventKind::Connected { .. }
    ));

    let err = verifier.handle.start().await.unwrap_err();
    assert!(matches!(err, ControlError::Transition(_)));

    verifier.shutdown().await;
}

#[tokio::test]
async fn test_controls_without_session() {
    let verifier = TestVerifier::spawn(3, FAST).await;

    assert_eq!(verifier.handle.start().await, Err(ControlError::NoSession));
    assert_eq!(verifier.handle.stop().await, Ok(()));
    assert_eq!(verifier.handle.disconnect().await, Ok(()));

    verifier.shutdown().await;
}

#[tokio::test]
async fn test_operator_disconnect_closes_connection() {
    let mut verifier = TestVerifier::spawn(5, FAST).await;
    let mut prover = RawProver::connect(verifier.addr, "seed", 5).await;
    prover.commit().await;
    verifier.wait_for(is_commitment).await;

    verifier.handle.disconnect().await.unwrap();

    let events = verifier.collect_until_disconnected().await;
    assert_eq!(
        events,
        vec![
            SessionEventKind::Terminated {
                reason: TerminationReason::Disconnected
            },
            SessionEventKind::Disconnected
        ]
    );
    assert_eq!(prover.read_challenge().await, None);

    verifier.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_terminates_live_session() {
    let mut verifier = TestVerifier::spawn(5, FAST).await;
    let mut prover = RawProver::connect(verifier.addr, "seed", 5).await;
    prover.commit().await;
    verifier.wait_for(is_commitment).await;

    verifier.handle.shutdown();
    let terminated = verifier
        .wait_for(|kind| matches!(kind, SessionEventKind::Terminated { .. }))
        .await;
    assert_eq!(
        terminated,
        SessionEventKind::Terminated {
            reason: TerminationReason::Shutdown
        }
    );
    assert_eq!(prover.read_challenge().await, None);

    verifier.shutdown().await;
}
