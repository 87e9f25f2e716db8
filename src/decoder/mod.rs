pub mod frames;
pub mod still;

use thiserror::Error;
use tokio::sync::mpsc;

pub use frames::{Frame, FrameFeedDecoder};
pub use still::decode_image;

/// Signals a live decoder delivers while it holds its resource.
///
/// `Decoded` is sent at most once per acquisition; `FrameError` may be sent
/// any number of times before that and is never fatal on its own.
#[derive(Debug, Clone)]
pub enum DecodeSignal {
    Decoded(String),
    FrameError(String),
}

/// Channel end a live decoder pushes its signals into.
pub type DecodeSink = mpsc::UnboundedSender<DecodeSignal>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("decoder resource unavailable: {reason}")]
    ResourceUnavailable { reason: String },

    #[error("image could not be read: {reason}")]
    UnreadableImage { reason: String },

    #[error("no decodable code found")]
    NoSymbolFound,

    #[error("code detected but not decodable: {reason}")]
    SymbolCorrupt { reason: String },

    #[error("found {count} codes where exactly one was expected")]
    AmbiguousSymbols { count: usize },
}

/// Capability contract for a live camera-style decoder.
///
/// The scan session owns exactly one of these. `begin` acquires the
/// underlying resource and starts delivering signals into `sink`; `shutdown`
/// releases it. `shutdown` is idempotent and must never fail; internal
/// teardown errors are logged by the implementation, not surfaced.
pub trait LiveDecoder: Send + 'static {
    fn begin(&mut self, sink: DecodeSink) -> Result<(), DecodeError>;

    fn shutdown(&mut self);
}
