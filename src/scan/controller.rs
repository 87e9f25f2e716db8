use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::decoder::{DecodeError, DecodeSignal, LiveDecoder};
use crate::payload::{parse_payload, NormalizedRecord};

use super::{ScanState, ScanStatus};

type DecoderSlot = Arc<Mutex<Option<Box<dyn LiveDecoder>>>>;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to acquire decoder resource")]
    ResourceUnavailable {
        #[source]
        source: DecodeError,
    },

    #[error("scan session is {status} and can only start from Idle")]
    NotIdle { status: ScanStatus },
}

/// Events a scan session publishes to its consumer.
///
/// `Completed` carries the one payload a session may ever emit; after it (or
/// after `Cancelled`) the session is terminal and the channel stays quiet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ScanEvent {
    Started { session_id: String },
    Completed { raw: String, record: NormalizedRecord },
    Cancelled,
}

/// One live camera-based scanning attempt.
///
/// Owns the decoder handle it is constructed with (never looked up through
/// any global) and guarantees exactly one resource acquisition per `start`
/// and exactly one release per terminal transition. A completed or cancelled
/// session is done; scanning again means constructing a fresh one.
pub struct ScanSession {
    session_id: String,
    state: Arc<Mutex<ScanState>>,
    decoder: DecoderSlot,
    events_tx: mpsc::UnboundedSender<ScanEvent>,
    cancel_token: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ScanSession {
    /// Returns the session and the receiving end of its event channel.
    pub fn new(decoder: impl LiveDecoder) -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                session_id: Uuid::new_v4().to_string(),
                state: Arc::new(Mutex::new(ScanState::new())),
                decoder: Arc::new(Mutex::new(Some(Box::new(decoder)))),
                events_tx,
                cancel_token: CancellationToken::new(),
                pump: Mutex::new(None),
            },
            events_rx,
        )
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn state(&self) -> ScanState {
        self.state.lock().await.clone()
    }

    /// Acquire the decoder and go `Idle -> Active`.
    ///
    /// On acquisition failure the handle is kept and the session stays
    /// `Idle`, so the caller decides whether to retry; nothing retries
    /// automatically.
    pub async fn start(&self) -> Result<(), ScanError> {
        let mut state = self.state.lock().await;
        if state.status != ScanStatus::Idle {
            return Err(ScanError::NotIdle {
                status: state.status,
            });
        }

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        {
            let mut slot = self.decoder.lock().await;
            let Some(mut handle) = slot.take() else {
                return Err(ScanError::ResourceUnavailable {
                    source: DecodeError::ResourceUnavailable {
                        reason: "decoder handle already released".to_string(),
                    },
                });
            };
            match handle.begin(signal_tx) {
                Ok(()) => *slot = Some(handle),
                Err(err) => {
                    *slot = Some(handle);
                    return Err(ScanError::ResourceUnavailable { source: err });
                }
            }
        }

        state.begin(self.session_id.clone(), Utc::now());
        drop(state);

        info!("scan session {} active", self.session_id);
        let _ = self.events_tx.send(ScanEvent::Started {
            session_id: self.session_id.clone(),
        });

        let pump = tokio::spawn(signal_pump(
            signal_rx,
            self.state.clone(),
            self.decoder.clone(),
            self.events_tx.clone(),
            self.cancel_token.clone(),
            self.session_id.clone(),
        ));
        *self.pump.lock().await = Some(pump);

        Ok(())
    }

    /// Tear the session down. Valid from `Idle` or `Active`; a no-op once the
    /// session is terminal, so calling it repeatedly is safe and releases the
    /// decoder at most once.
    pub async fn cancel(&self) {
        let prior = {
            let mut guard = self.state.lock().await;
            if guard.status.is_terminal() {
                return;
            }
            let prior = guard.status;
            guard.cancel(Utc::now());
            prior
        };

        self.cancel_token.cancel();
        if let Some(handle) = self.pump.lock().await.take() {
            if let Err(err) = handle.await {
                warn!(
                    "scan session {} pump task failed to join: {err}",
                    self.session_id
                );
            }
        }

        match prior {
            ScanStatus::Active => release(&self.decoder).await,
            // Never acquired, so there is nothing to release.
            _ => {
                self.decoder.lock().await.take();
            }
        }

        info!("scan session {} cancelled", self.session_id);
        let _ = self.events_tx.send(ScanEvent::Cancelled);
    }
}

async fn release(decoder: &DecoderSlot) {
    // Option::take makes the release single-shot on every exit path.
    if let Some(mut handle) = decoder.lock().await.take() {
        handle.shutdown();
    }
}

async fn signal_pump(
    mut signals: mpsc::UnboundedReceiver<DecodeSignal>,
    state: Arc<Mutex<ScanState>>,
    decoder: DecoderSlot,
    events_tx: mpsc::UnboundedSender<ScanEvent>,
    cancel_token: CancellationToken,
    session_id: String,
) {
    loop {
        tokio::select! {
            maybe_signal = signals.recv() => {
                match maybe_signal {
                    Some(DecodeSignal::Decoded(raw)) => {
                        {
                            let mut guard = state.lock().await;
                            if guard.status != ScanStatus::Active {
                                // Late signal after a terminal transition.
                                break;
                            }
                            guard.complete(Utc::now());
                        }
                        release(&decoder).await;

                        let record = parse_payload(&raw);
                        info!(
                            "scan session {} decoded payload with {} field(s)",
                            session_id,
                            record.len()
                        );
                        let _ = events_tx.send(ScanEvent::Completed { raw, record });
                        break;
                    }
                    Some(DecodeSignal::FrameError(reason)) => {
                        let mut guard = state.lock().await;
                        if guard.status == ScanStatus::Active {
                            guard.note_frame_error();
                            warn!(
                                "scan session {} frame error #{}: {}",
                                session_id, guard.frame_errors, reason
                            );
                        }
                    }
                    None => {
                        let lost = {
                            let mut guard = state.lock().await;
                            if guard.status == ScanStatus::Active {
                                guard.cancel(Utc::now());
                                true
                            } else {
                                false
                            }
                        };
                        if lost {
                            warn!(
                                "scan session {}: decoder stopped without a decode; cancelling",
                                session_id
                            );
                            release(&decoder).await;
                            let _ = events_tx.send(ScanEvent::Cancelled);
                        }
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => break,
        }
    }
}
