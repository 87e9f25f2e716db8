pub mod db;
pub mod decoder;
pub mod models;
pub mod payload;
pub mod scan;
pub mod settings;
pub mod utils;
pub mod view;

pub use db::Database;
pub use decoder::{DecodeError, DecodeSignal, DecodeSink, Frame, FrameFeedDecoder, LiveDecoder};
pub use models::{ScanRecord, ScanSource};
pub use payload::{parse_payload, NormalizedRecord, FALLBACK_KEY};
pub use scan::{ScanError, ScanEvent, ScanSession, ScanState, ScanStatus};
pub use settings::{ScanSettings, SettingsStore};
