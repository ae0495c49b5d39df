use serde::{Deserialize, Serialize};

/// Result of one scoring cycle, delivered to the host once per processed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionReport {
    /// Always within 0..=100.
    pub score: u8,
    pub face_detected: bool,
    pub looking_at_screen: bool,
    pub timestamp_ms: u64,
}

impl AttentionReport {
    pub fn no_face(timestamp_ms: u64) -> Self {
        Self {
            score: 0,
            face_detected: false,
            looking_at_screen: false,
            timestamp_ms,
        }
    }
}

/// Which rule of the scoring ladder produced a score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringBranch {
    NoFace,
    EyesClosed,
    Shaking,
    Nodding,
    Ideal,
    Partial,
}

impl ScoringBranch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoFace => "no_face",
            Self::EyesClosed => "eyes_closed",
            Self::Shaking => "shaking",
            Self::Nodding => "nodding",
            Self::Ideal => "ideal",
            Self::Partial => "partial",
        }
    }
}

impl std::fmt::Display for ScoringBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() {
        let report = AttentionReport {
            score: 70,
            face_detected: true,
            looking_at_screen: false,
            timestamp_ms: 42,
        };
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["score"], 70);
        assert_eq!(json["faceDetected"], true);
        assert_eq!(json["lookingAtScreen"], false);
        assert_eq!(json["timestampMs"], 42);
    }

    #[test]
    fn test_no_face_report() {
        let report = AttentionReport::no_face(9);
        assert_eq!(report.score, 0);
        assert!(!report.face_detected);
        assert!(!report.looking_at_screen);
    }

    #[test]
    fn test_branch_display() {
        assert_eq!(ScoringBranch::EyesClosed.to_string(), "eyes_closed");
    }
}
