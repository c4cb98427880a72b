//! File metadata record.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Store that is authoritative for a record's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageSource {
    /// Local disk under the storage directory.
    Local,
    /// Remote FTP mirror.
    Ftp,
    /// `file_blobs` table.
    Db,
}

impl StorageSource {
    /// Convert to the persisted string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageSource::Local => "local",
            StorageSource::Ftp => "ftp",
            StorageSource::Db => "db",
        }
    }

    /// Parse from the persisted string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Some(StorageSource::Local),
            "ftp" => Some(StorageSource::Ftp),
            "db" => Some(StorageSource::Db),
            _ => None,
        }
    }
}

impl std::fmt::Display for StorageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one file known to the registry.
///
/// Records are never edited in place; they are created by upload or
/// reconciliation and removed by delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    /// Sanitized name; also the file name on the remote mirror.
    pub name: String,
    pub original_name: String,
    pub size: i64,
    pub mime_type: String,
    pub category: String,
    pub amount: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub is_processed: bool,
    pub source: StorageSource,
    pub local_path: Option<String>,
    pub ftp_path: Option<String>,
    pub sha256: Option<String>,
}

impl FileRecord {
    /// Current time at the precision records are persisted with.
    pub fn timestamp_now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(3)
    }

    /// Check whether `term` (already lower-cased) occurs in either name.
    pub fn name_contains(&self, term: &str) -> bool {
        self.name.to_lowercase().contains(term) || self.original_name.to_lowercase().contains(term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileRecord {
        FileRecord {
            id: "0b7c3c1e-5f1d-4a3e-9d6e-2f1a7b9c8d00".to_string(),
            name: "Quarterly_Report.pdf".to_string(),
            original_name: "Quarterly Report.pdf".to_string(),
            size: 2048,
            mime_type: "application/pdf".to_string(),
            category: "pdf".to_string(),
            amount: Some("125.50".to_string()),
            uploaded_at: "2024-03-01T10:00:00.250Z".parse().unwrap(),
            is_processed: true,
            source: StorageSource::Local,
            local_path: Some("data/uploads/ab/ab.pdf".to_string()),
            ftp_path: None,
            sha256: None,
        }
    }

    #[test]
    fn test_storage_source_round_trip() {
        for source in [StorageSource::Local, StorageSource::Ftp, StorageSource::Db] {
            assert_eq!(StorageSource::parse(source.as_str()), Some(source));
        }
        assert_eq!(StorageSource::parse("FTP"), Some(StorageSource::Ftp));
        assert_eq!(StorageSource::parse("s3"), None);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();

        assert_eq!(json["originalName"], "Quarterly Report.pdf");
        assert_eq!(json["mimeType"], "application/pdf");
        assert_eq!(json["isProcessed"], true);
        assert_eq!(json["source"], "local");
        assert_eq!(json["ftpPath"], serde_json::Value::Null);
        assert!(json["uploadedAt"].as_str().unwrap().starts_with("2024-03-01T10:00:00.250"));
    }

    #[test]
    fn test_name_contains_checks_both_names() {
        let record = sample();
        assert!(record.name_contains("quarterly_"));
        assert!(record.name_contains("quarterly report"));
        assert!(!record.name_contains("invoice"));
    }

    #[test]
    fn test_timestamp_now_has_millisecond_precision() {
        let now = FileRecord::timestamp_now();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
