//! Scan events recorded against a roll's tag

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RollStatus;

/// Kind of scan performed on the shop floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Issue,
    Receive,
    Move,
    Audit,
    QualityCheck,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Issue => "issue",
            ScanType::Receive => "receive",
            ScanType::Move => "move",
            ScanType::Audit => "audit",
            ScanType::QualityCheck => "quality_check",
        }
    }

    /// Scans that are kept for history and never change a roll's status
    pub fn is_history_only(&self) -> bool {
        matches!(self, ScanType::Move | ScanType::Audit | ScanType::QualityCheck)
    }
}

impl std::str::FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "issue" => Ok(ScanType::Issue),
            "receive" => Ok(ScanType::Receive),
            "move" => Ok(ScanType::Move),
            "audit" => Ok(ScanType::Audit),
            "quality_check" => Ok(ScanType::QualityCheck),
            other => Err(format!(
                "Invalid scan type: {}. Use issue, receive, move, audit or quality_check",
                other
            )),
        }
    }
}

/// Append-only history entry for a scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: Uuid,
    pub roll_id: Uuid,
    pub roll_number: String,
    pub scan_type: ScanType,
    pub previous_status: RollStatus,
    pub new_status: RollStatus,
    pub location: Option<String>,
    pub scanned_by: String,
    pub notes: Option<String>,
    pub scanned_at: DateTime<Utc>,
}
