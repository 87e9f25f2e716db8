use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::still::decode_luma;
use super::{DecodeError, DecodeSignal, DecodeSink, LiveDecoder};

// Set to false to silence per-frame logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Greyscale camera frame, row-major, one byte per pixel.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
}

impl Frame {
    /// Build a frame from encoded image bytes (PNG, JPEG, ...).
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let img = image::load_from_memory(bytes).map_err(|err| DecodeError::UnreadableImage {
            reason: err.to_string(),
        })?;
        let luma = img.to_luma8();
        Ok(Self {
            width: luma.width(),
            height: luma.height(),
            luma: luma.into_raw(),
        })
    }
}

/// Live decoder fed frames by the embedder through a bounded channel.
///
/// Whatever produces frames (camera layer, test harness, CLI) holds the
/// sender; the decoder owns the receiver until `begin` hands it to a worker
/// task. The worker attempts one decode per frame, reports failures as
/// transient `FrameError` signals, and stops after its first success or when
/// `shutdown` cancels it. A second `begin` on the same instance fails with
/// `ResourceUnavailable`, the busy-camera analog.
pub struct FrameFeedDecoder {
    frames: Option<mpsc::Receiver<Frame>>,
    cancel_token: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl FrameFeedDecoder {
    /// Returns the decoder and the sender the frame producer keeps.
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<Frame>) {
        let (frame_tx, frame_rx) = mpsc::channel(capacity);
        (
            Self {
                frames: Some(frame_rx),
                cancel_token: CancellationToken::new(),
                worker: None,
            },
            frame_tx,
        )
    }
}

impl LiveDecoder for FrameFeedDecoder {
    fn begin(&mut self, sink: DecodeSink) -> Result<(), DecodeError> {
        let frames = self
            .frames
            .take()
            .ok_or_else(|| DecodeError::ResourceUnavailable {
                reason: "frame source already claimed".to_string(),
            })?;

        let token = self.cancel_token.clone();
        self.worker = Some(tokio::spawn(frame_loop(frames, sink, token)));
        Ok(())
    }

    fn shutdown(&mut self) {
        self.cancel_token.cancel();
        // The worker exits on its own once it observes the token; dropping
        // the handle detaches it rather than blocking a sync caller.
        self.worker.take();
    }
}

async fn frame_loop(
    mut frames: mpsc::Receiver<Frame>,
    sink: DecodeSink,
    cancel_token: CancellationToken,
) {
    let mut seen: u64 = 0;
    loop {
        tokio::select! {
            maybe_frame = frames.recv() => {
                let Some(frame) = maybe_frame else {
                    log_info!("frame source closed after {} frames without a decode", seen);
                    break;
                };
                seen += 1;

                match decode_frame(frame).await {
                    Ok(content) => {
                        log_info!("decoded frame {} ({} bytes of payload)", seen, content.len());
                        let _ = sink.send(DecodeSignal::Decoded(content));
                        break;
                    }
                    Err(err) => {
                        // A bad frame is expected; keep scanning.
                        let _ = sink.send(DecodeSignal::FrameError(err.to_string()));
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("frame decode loop shutting down after {} frames", seen);
                break;
            }
        }
    }
}

async fn decode_frame(frame: Frame) -> Result<String, DecodeError> {
    match tokio::task::spawn_blocking(move || {
        decode_luma(frame.width, frame.height, &frame.luma, false)
    })
    .await
    {
        Ok(result) => result,
        Err(err) => {
            log_warn!("frame decode worker join failed: {err}");
            Err(DecodeError::ResourceUnavailable {
                reason: format!("frame decode worker join failed: {err}"),
            })
        }
    }
}
