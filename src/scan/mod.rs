pub mod controller;
pub mod state;

pub use controller::{ScanError, ScanEvent, ScanSession};
pub use state::{ScanState, ScanStatus};
