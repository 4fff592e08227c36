use super::messages::{AudioFrameMessage, TranscriptMessage};
use crate::config::AudioConfig;
use crate::session::{SessionRegistry, SpeechSession, Utterance};
use anyhow::{Context, Result};
use async_nats::Client;
use base64::Engine;
use futures::stream::{Stream, StreamExt};
use futures::pin_mut;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Subject pattern audio frames arrive on
pub const AUDIO_FRAME_SUBJECT: &str = "audio.frame.>";

/// Subject final transcripts are published to
pub const TRANSCRIPT_SUBJECT: &str = "stt.text.final";

/// Finished transcripts waiting to be published
const TRANSCRIPT_QUEUE: usize = 64;

/// Bridges NATS audio frames into the session registry
pub struct NatsBridge {
    client: Client,
    registry: Arc<SessionRegistry>,
}

impl NatsBridge {
    /// Connect to NATS server
    pub async fn connect(url: &str, registry: Arc<SessionRegistry>) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client, registry })
    }

    /// Consume audio frames until the subscription closes
    pub async fn run(self) -> Result<()> {
        let subscriber = self
            .client
            .subscribe(AUDIO_FRAME_SUBJECT.to_string())
            .await
            .context("Failed to subscribe to audio frames")?;

        info!("Subscribed to {}", AUDIO_FRAME_SUBJECT);

        let frames = subscriber.filter_map(|msg| async move {
            match serde_json::from_slice::<AudioFrameMessage>(&msg.payload) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!("Failed to parse audio frame on {}: {}", msg.subject, e);
                    None
                }
            }
        });

        let (tx, mut rx) = mpsc::channel(TRANSCRIPT_QUEUE);
        let client = self.client.clone();
        let publisher = tokio::spawn(async move {
            while let Some(transcript) = rx.recv().await {
                if let Err(e) = publish_transcript(&client, &transcript).await {
                    error!("Failed to publish transcript: {:#}", e);
                }
            }
        });

        pump_frames(self.registry, frames, tx).await;
        info!("Audio frame subscription closed");

        publisher.await.context("Transcript publisher panicked")?;

        Ok(())
    }
}

async fn publish_transcript(client: &Client, transcript: &TranscriptMessage) -> Result<()> {
    let payload = serde_json::to_vec(transcript)?;

    client
        .publish(TRANSCRIPT_SUBJECT.to_string(), payload.into())
        .await
        .context("Failed to publish transcript")?;

    info!(
        "Published transcript to {} (session={}, chars={})",
        TRANSCRIPT_SUBJECT,
        transcript.session_id,
        transcript.text.len()
    );

    Ok(())
}

/// Route frames into sessions in arrival order.
///
/// Feeding and closing an utterance happen inline so per-session order holds.
/// Each engine call runs on its own task and its transcript is sent to
/// `transcripts`, so a slow transcription never holds up other frames.
pub async fn pump_frames<S>(registry: Arc<SessionRegistry>, frames: S, transcripts: mpsc::Sender<TranscriptMessage>)
where
    S: Stream<Item = AudioFrameMessage>,
{
    let expected = registry.config().audio;
    pin_mut!(frames);

    while let Some(frame) = frames.next().await {
        match handle_frame(&registry, frame, expected).await {
            Ok(Some(pending)) => {
                let transcripts = transcripts.clone();
                tokio::spawn(async move {
                    let transcript = pending.transcribe().await;
                    if transcripts.send(transcript).await.is_err() {
                        warn!("Transcript publisher is gone, dropping transcript");
                    }
                });
            }
            Ok(None) => {}
            Err(e) => warn!("Dropped audio frame: {:#}", e),
        }
    }
}

/// A closed utterance from a final frame, not yet transcribed
pub struct PendingTranscript {
    session: Arc<SpeechSession>,
    utterance: Option<Utterance>,
}

impl PendingTranscript {
    pub async fn transcribe(self) -> TranscriptMessage {
        let text = match self.utterance {
            Some(utterance) => self.session.transcribe_utterance(utterance).await,
            None => String::new(),
        };

        TranscriptMessage {
            session_id: self.session.id().to_string(),
            text,
            partial: false,
            timestamp: chrono::Utc::now().to_rfc3339(),
            confidence: None,
        }
    }
}

/// Feed one frame into its session. A final frame also closes the utterance
/// and hands it back for transcription.
pub async fn handle_frame(
    registry: &SessionRegistry,
    frame: AudioFrameMessage,
    expected: AudioConfig,
) -> Result<Option<PendingTranscript>> {
    if frame.session_id.is_empty() {
        anyhow::bail!("session_id is required");
    }

    let pcm = base64::engine::general_purpose::STANDARD
        .decode(frame.pcm.as_bytes())
        .with_context(|| format!("Invalid base64 PCM in frame {}", frame.sequence))?;

    if !pcm.is_empty() && (frame.sample_rate != expected.sample_rate || frame.channels != expected.channels) {
        warn!(
            "Frame {} for {} is {}Hz/{}ch, expected {}Hz/{}ch",
            frame.sequence,
            frame.session_id,
            frame.sample_rate,
            frame.channels,
            expected.sample_rate,
            expected.channels
        );
    }

    let session = registry.get_or_create(&frame.session_id).await;
    if !pcm.is_empty() {
        session.feed(&pcm).await;
    }

    if !frame.final_frame {
        return Ok(None);
    }

    let utterance = session.close_utterance().await;

    Ok(Some(PendingTranscript { session, utterance }))
}
