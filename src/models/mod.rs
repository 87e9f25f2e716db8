mod scan;

pub use scan::{ScanRecord, ScanSource};
