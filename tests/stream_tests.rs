// Integration tests for the transport-level request handling
//
// Streams are driven from in-memory request iterators; NATS frames are
// handled without a broker.

mod common;

use anyhow::{anyhow, Result};
use base64::Engine;
use common::{registry_with, Behaviour, MockFactory};
use futures::stream;
use loqa_speech::audio::WAV_HEADER_LEN;
use loqa_speech::config::AudioConfig;
use loqa_speech::nats::{handle_frame, pump_frames, AudioFrameMessage};
use loqa_speech::transport::{cleanup_session, transcribe_stream};
use loqa_speech::{CleanupRequest, TranscribeRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

fn chunk(session_id: &str, audio: &[u8], end_of_stream: bool) -> Result<TranscribeRequest> {
    Ok(TranscribeRequest {
        session_id: session_id.to_string(),
        audio_chunk: audio.to_vec(),
        end_of_stream,
    })
}

fn frame(session_id: &str, sequence: u32, pcm: &[u8], final_frame: bool) -> AudioFrameMessage {
    AudioFrameMessage {
        session_id: session_id.to_string(),
        sequence,
        pcm: base64::engine::general_purpose::STANDARD.encode(pcm),
        sample_rate: 16000,
        channels: 1,
        timestamp: "2025-10-27T14:30:00Z".to_string(),
        final_frame,
    }
}

#[tokio::test]
async fn test_stream_finalizes_on_end_of_stream() {
    let factory = Arc::new(MockFactory::replying("move the card to done"));
    let registry = registry_with(&factory);

    let requests = stream::iter(vec![
        chunk("board-1:alice", &[1u8; 320], false),
        chunk("board-1:alice", &[2u8; 320], false),
        chunk("board-1:alice", &[], true),
    ]);

    let response = transcribe_stream(&registry, requests).await;

    assert!(response.success);
    assert_eq!(response.transcription, "move the card to done");
    assert!(response.error.is_empty());

    let calls = factory.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.len(), WAV_HEADER_LEN + 640);
}

#[tokio::test]
async fn test_missing_session_id_fails_without_creating_session() {
    let factory = Arc::new(MockFactory::replying("x"));
    let registry = registry_with(&factory);

    let response = transcribe_stream(&registry, stream::iter(vec![chunk("", &[1u8; 10], false)])).await;

    assert!(!response.success);
    assert_eq!(response.error, "session_id is required");
    assert_eq!(registry.active_count().await, 0);
}

#[tokio::test]
async fn test_stream_closed_without_end_of_stream_finalizes_on_close() {
    let factory = Arc::new(MockFactory::replying("closing words"));
    let registry = registry_with(&factory);

    let requests = stream::iter(vec![chunk("board-1:bob", &[3u8; 64], false)]);
    let response = transcribe_stream(&registry, requests).await;

    assert!(response.success);
    assert_eq!(response.transcription, "closing words");
    assert_eq!(factory.call_count(), 1);
}

#[tokio::test]
async fn test_empty_stream_reports_failure() {
    let factory = Arc::new(MockFactory::replying("x"));
    let registry = registry_with(&factory);

    let requests = stream::iter(Vec::<Result<TranscribeRequest>>::new());
    let response = transcribe_stream(&registry, requests).await;

    assert!(!response.success);
    assert_eq!(response.error, "Stream ended without finalization");
}

#[tokio::test]
async fn test_stream_error_surfaces_as_failed_response() {
    let factory = Arc::new(MockFactory::replying("x"));
    let registry = registry_with(&factory);

    let requests = stream::iter(vec![
        chunk("board-1:alice", &[1u8; 10], false),
        Err(anyhow!("connection reset")),
    ]);
    let response = transcribe_stream(&registry, requests).await;

    assert!(!response.success);
    assert!(response.error.contains("connection reset"));
    assert_eq!(factory.call_count(), 0);
}

#[tokio::test]
async fn test_engine_failure_is_still_a_successful_response() {
    let factory = Arc::new(MockFactory::failing_engine());
    let registry = registry_with(&factory);

    let requests = stream::iter(vec![chunk("board-1:alice", &[1u8; 10], true)]);
    let response = transcribe_stream(&registry, requests).await;

    assert!(response.success);
    assert_eq!(response.transcription, "");
}

#[tokio::test]
async fn test_cleanup_session_responses() {
    let factory = Arc::new(MockFactory::replying("x"));
    let registry = registry_with(&factory);
    registry.get_or_create("board-1:alice").await;

    let removed = cleanup_session(
        &registry,
        CleanupRequest {
            session_id: "board-1:alice".to_string(),
        },
    )
    .await;
    assert!(removed.success);
    assert!(removed.removed);
    assert_eq!(registry.active_count().await, 0);

    let missing = cleanup_session(
        &registry,
        CleanupRequest {
            session_id: "board-1:alice".to_string(),
        },
    )
    .await;
    assert!(missing.success, "unknown session counts as already cleaned up");
    assert!(!missing.removed);

    let empty = cleanup_session(
        &registry,
        CleanupRequest {
            session_id: String::new(),
        },
    )
    .await;
    assert!(!empty.success);
}

#[tokio::test]
async fn test_nats_frames_feed_until_final() -> Result<()> {
    let factory = Arc::new(MockFactory::replying("from nats"));
    let registry = registry_with(&factory);
    let audio = AudioConfig::default();

    assert!(handle_frame(&registry, frame("meet-1:dan", 0, &[5u8; 320], false), audio)
        .await?
        .is_none());
    assert!(handle_frame(&registry, frame("meet-1:dan", 1, &[6u8; 320], false), audio)
        .await?
        .is_none());

    let pending = handle_frame(&registry, frame("meet-1:dan", 2, &[], true), audio)
        .await?
        .expect("final frame should produce a transcript");

    // The utterance is closed before the engine runs
    let session = registry.get("meet-1:dan").await.expect("session exists");
    assert_eq!(session.buffered_len().await, 0);
    assert_eq!(factory.call_count(), 0);

    let transcript = pending.transcribe().await;

    assert_eq!(transcript.session_id, "meet-1:dan");
    assert_eq!(transcript.text, "from nats");
    assert!(!transcript.partial);

    let calls = factory.calls.lock().unwrap();
    assert_eq!(calls[0].0.len(), WAV_HEADER_LEN + 640);

    Ok(())
}

#[tokio::test]
async fn test_nats_frame_with_bad_base64_is_rejected() {
    let factory = Arc::new(MockFactory::replying("x"));
    let registry = registry_with(&factory);

    let mut bad = frame("meet-1:dan", 0, &[], false);
    bad.pcm = "%%%".to_string();

    assert!(handle_frame(&registry, bad, AudioConfig::default()).await.is_err());
    assert_eq!(registry.active_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_final_frame_does_not_hold_up_other_sessions() -> Result<()> {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let factory = Arc::new(MockFactory::with_behaviour(Behaviour::Gated {
        reply: "dan's words".to_string(),
        started: Arc::clone(&started),
        release: Arc::clone(&release),
    }));
    let registry = Arc::new(registry_with(&factory));

    let (frame_tx, frame_rx) = futures::channel::mpsc::unbounded();
    let (transcript_tx, mut transcript_rx) = mpsc::channel(8);
    let pump = tokio::spawn(pump_frames(Arc::clone(&registry), frame_rx, transcript_tx));

    frame_tx.unbounded_send(frame("meet-1:dan", 0, &[1u8; 320], false))?;
    frame_tx.unbounded_send(frame("meet-1:dan", 1, &[], true))?;
    started.notified().await;

    // Dan's engine call is parked; Erin's frames must still be fed
    frame_tx.unbounded_send(frame("meet-1:erin", 0, &[2u8; 6], false))?;
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Some(session) = registry.get("meet-1:erin").await {
                if session.buffered_len().await == 6 {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("frames for another session stalled behind a transcription");

    release.notify_one();
    let transcript = transcript_rx.recv().await.expect("transcript for dan");
    assert_eq!(transcript.session_id, "meet-1:dan");
    assert_eq!(transcript.text, "dan's words");

    drop(frame_tx);
    pump.await?;

    Ok(())
}
