//! Display projection pushed to the UI after every tick or poll.

use serde::{Deserialize, Serialize};

use crate::session::status::SessionStatus;

pub const WARMUP_LABEL: &str = "Get Ready";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Engine clock time the snapshot was taken at
    pub at: f64,
    pub status: SessionStatus,
    /// Warmup remaining during warmup, exercise remaining otherwise
    pub display_time: f64,
    pub display_progress: f64,
    pub is_warmup: bool,
    pub label: String,
    pub title: String,
    pub bpm: u32,
    pub tick_index: u8,
}

impl SessionSnapshot {
    /// `display_time` as `m:ss`
    pub fn clock(&self) -> String {
        format_clock(self.display_time)
    }
}

pub fn status_label(status: SessionStatus) -> String {
    match status {
        SessionStatus::Warmup => WARMUP_LABEL.to_string(),
        other => other.to_string(),
    }
}

/// Minutes and zero-padded seconds, truncating fractions.
pub fn format_clock(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", whole / 60, whole % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(2.9), "0:02");
        assert_eq!(format_clock(65.0), "1:05");
        assert_eq!(format_clock(600.0), "10:00");
        assert_eq!(format_clock(-1.0), "0:00");
    }

    #[test]
    fn test_labels() {
        assert_eq!(status_label(SessionStatus::Warmup), "Get Ready");
        assert_eq!(status_label(SessionStatus::Paused), "paused");
    }

    #[test]
    fn test_camel_case_fields() {
        let snapshot = SessionSnapshot {
            at: 1.0,
            status: SessionStatus::Warmup,
            display_time: 2.0,
            display_progress: 33.3,
            is_warmup: true,
            label: WARMUP_LABEL.to_string(),
            title: "Quick Start".to_string(),
            bpm: 120,
            tick_index: 0,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["displayTime"], 2.0);
        assert_eq!(json["isWarmup"], true);
        assert_eq!(json["status"], "warmup");
        assert_eq!(json["tickIndex"], 0);
    }
}
