use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a canvas session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CanvasStatus {
    /// Accepting draws
    #[default]
    Start,
    /// Temporarily closed; can be resumed
    Pause,
    /// Session is over
    End,
}

impl CanvasStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanvasStatus::Start => "START",
            CanvasStatus::Pause => "PAUSE",
            CanvasStatus::End => "END",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, CanvasStatus::Start)
    }
}

impl fmt::Display for CanvasStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored status string is not one of the known states
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown canvas status {:?}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for CanvasStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "START" => Ok(CanvasStatus::Start),
            "PAUSE" => Ok(CanvasStatus::Pause),
            "END" => Ok(CanvasStatus::End),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A fixed-size drawing session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Canvas {
    pub id: String,
    /// Identity exempt from the draw cooldown
    pub admin_id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub status: CanvasStatus,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl Canvas {
    /// Create an active canvas
    pub fn new(
        id: impl Into<String>,
        admin_id: impl Into<String>,
        name: impl Into<String>,
        width: u32,
        height: u32,
        start_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            admin_id: admin_id.into(),
            name: name.into(),
            width,
            height,
            status: CanvasStatus::Start,
            start_date,
            end_date: None,
        }
    }

    pub fn is_admin(&self, writer_id: &str) -> bool {
        self.admin_id == writer_id
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_text() {
        for status in [CanvasStatus::Start, CanvasStatus::Pause, CanvasStatus::End] {
            assert_eq!(status.as_str().parse::<CanvasStatus>(), Ok(status));
        }
        assert_eq!("pause".parse::<CanvasStatus>(), Ok(CanvasStatus::Pause));
        assert!("RESET".parse::<CanvasStatus>().is_err());
    }

    #[test]
    fn test_only_start_is_active() {
        assert!(CanvasStatus::Start.is_active());
        assert!(!CanvasStatus::Pause.is_active());
        assert!(!CanvasStatus::End.is_active());
    }

    #[test]
    fn test_canvas_json_shape() {
        let canvas = Canvas::new("c1", "admin", "Test", 4, 3, DateTime::<Utc>::UNIX_EPOCH);
        let json = serde_json::to_value(&canvas).unwrap();
        assert_eq!(json["adminId"], "admin");
        assert_eq!(json["status"], "START");
        assert_eq!(json["width"], 4);
        assert!(json.get("endDate").is_none());
        assert_eq!(canvas.area(), 12);
        assert!(canvas.is_admin("admin"));
        assert!(!canvas.is_admin("someone"));
    }
}
