use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScanStatus {
    Idle,
    Active,
    Completed,
    Cancelled,
}

impl Default for ScanStatus {
    fn default() -> Self {
        ScanStatus::Idle
    }
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Idle => "Idle",
            ScanStatus::Active => "Active",
            ScanStatus::Completed => "Completed",
            ScanStatus::Cancelled => "Cancelled",
        }
    }

    /// Completed and Cancelled are terminal: no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Cancelled)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanState {
    pub status: ScanStatus,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Frames that failed to decode while the session was active.
    pub frame_errors: u64,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            status: ScanStatus::Idle,
            session_id: None,
            started_at: None,
            finished_at: None,
            frame_errors: 0,
        }
    }
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, session_id: String, started_at: DateTime<Utc>) {
        *self = Self {
            status: ScanStatus::Active,
            session_id: Some(session_id),
            started_at: Some(started_at),
            finished_at: None,
            frame_errors: 0,
        };
    }

    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = ScanStatus::Completed;
        self.finished_at = Some(at);
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) {
        self.status = ScanStatus::Cancelled;
        self.finished_at = Some(at);
    }

    pub fn note_frame_error(&mut self) {
        self.frame_errors = self.frame_errors.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_idle() {
        let state = ScanState::new();
        assert_eq!(state.status, ScanStatus::Idle);
        assert!(!state.status.is_terminal());
        assert!(state.session_id.is_none());
    }

    #[test]
    fn begin_resets_counters() {
        let mut state = ScanState::new();
        state.note_frame_error();
        state.begin("abc".to_string(), Utc::now());
        assert_eq!(state.status, ScanStatus::Active);
        assert_eq!(state.frame_errors, 0);
        assert!(state.started_at.is_some());
        assert!(state.finished_at.is_none());
    }

    #[test]
    fn complete_and_cancel_are_terminal() {
        let mut completed = ScanState::new();
        completed.begin("a".to_string(), Utc::now());
        completed.complete(Utc::now());
        assert!(completed.status.is_terminal());
        assert!(completed.finished_at.is_some());

        let mut cancelled = ScanState::new();
        cancelled.begin("b".to_string(), Utc::now());
        cancelled.cancel(Utc::now());
        assert!(cancelled.status.is_terminal());
    }
}
