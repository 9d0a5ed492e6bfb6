//! Cached policy records

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};

/// Sentinel for metadata the cache never learned (placeholders, migrated
/// legacy entries).
pub const UNKNOWN: &str = "unknown";

/// Lifecycle status of a cached policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    Active,
    Claimed,
    Expired,
}

impl Default for PolicyStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Claimed => "claimed",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A policy the user believes they own, as kept in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRecord {
    pub policy_id: String,
    pub flight_number: String,
    pub airline: String,
    /// ISO-8601, or [`UNKNOWN`]
    pub departure_time: String,
    /// Decimal SUI amount as entered
    pub coverage_amount: String,
    /// Decimal SUI amount as entered
    pub premium: String,
    #[serde(default)]
    pub status: PolicyStatus,
    pub created_at: String,
}

impl PolicyRecord {
    /// Record for an id whose metadata is not known locally.
    pub fn placeholder(policy_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            policy_id: policy_id.into(),
            flight_number: UNKNOWN.to_string(),
            airline: UNKNOWN.to_string(),
            departure_time: UNKNOWN.to_string(),
            coverage_amount: UNKNOWN.to_string(),
            premium: UNKNOWN.to_string(),
            status: PolicyStatus::Active,
            created_at: iso_timestamp(now),
        }
    }

    /// Record for a freshly created policy.
    pub fn from_request(
        policy_id: impl Into<String>,
        request: &PolicyRequest,
        now: DateTime<Utc>,
    ) -> Self {
        let departure_time = request
            .departure()
            .map(iso_timestamp)
            .unwrap_or_else(|_| UNKNOWN.to_string());

        Self {
            policy_id: policy_id.into(),
            flight_number: request.flight_number.trim().to_string(),
            airline: request.airline.trim().to_string(),
            departure_time,
            coverage_amount: request.coverage_amount.trim().to_string(),
            premium: request.premium.trim().to_string(),
            status: PolicyStatus::Active,
            created_at: iso_timestamp(now),
        }
    }

    /// Whether the metadata was never filled in
    pub fn is_placeholder(&self) -> bool {
        self.flight_number == UNKNOWN && self.airline == UNKNOWN
    }
}

/// Form input for creating a policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub flight_number: String,
    pub airline: String,
    /// RFC 3339, or `YYYY-MM-DDTHH:MM[:SS]` taken as UTC
    pub departure_time: String,
    /// Decimal SUI
    pub coverage_amount: String,
    /// Decimal SUI
    pub premium: String,
}

impl PolicyRequest {
    /// Every field is required.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("flight_number", &self.flight_number),
            ("airline", &self.airline),
            ("departure_time", &self.departure_time),
            ("coverage_amount", &self.coverage_amount),
            ("premium", &self.premium),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            return Err(PolicyError::InvalidInput(format!(
                "Please fill in all required fields (missing: {})",
                missing.join(", ")
            )));
        }
        self.departure()?;
        Ok(())
    }

    /// Parsed departure time
    pub fn departure(&self) -> Result<DateTime<Utc>> {
        let raw = self.departure_time.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(naive.and_utc());
            }
        }
        Err(PolicyError::InvalidInput(format!(
            "departure time '{}' is not an ISO-8601 date-time",
            self.departure_time
        )))
    }

    /// Departure as unix seconds, the contract's representation
    pub fn departure_timestamp(&self) -> Result<u64> {
        let departure = self.departure()?;
        u64::try_from(departure.timestamp()).map_err(|_| {
            PolicyError::InvalidInput(format!(
                "departure time '{}' is before 1970",
                self.departure_time
            ))
        })
    }
}

pub(crate) fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request() -> PolicyRequest {
        PolicyRequest {
            flight_number: "AA123".into(),
            airline: "American Airlines".into(),
            departure_time: "2026-10-20T14:30".into(),
            coverage_amount: "1.0".into(),
            premium: "0.1".into(),
        }
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PolicyStatus::Claimed).unwrap(), "\"claimed\"");
        let status: PolicyStatus = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(status, PolicyStatus::Expired);
    }

    #[test]
    fn test_record_uses_camel_case() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let record = PolicyRecord::placeholder(format!("0x{}", "a".repeat(64)), now);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["flightNumber"], UNKNOWN);
        assert_eq!(json["status"], "active");
        assert_eq!(json["createdAt"], "2026-10-19T12:00:00.000Z");
        assert!(record.is_placeholder());
    }

    #[test]
    fn test_departure_formats() {
        let mut req = request();
        assert_eq!(req.departure_timestamp().unwrap(), 1_792_506_600);

        req.departure_time = "2026-10-20T14:30:00Z".into();
        assert_eq!(req.departure_timestamp().unwrap(), 1_792_506_600);

        req.departure_time = "2026-10-20T16:30:00+02:00".into();
        assert_eq!(req.departure_timestamp().unwrap(), 1_792_506_600);

        req.departure_time = "tomorrow".into();
        assert!(req.departure().is_err());
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let mut req = request();
        assert!(req.validate().is_ok());

        req.airline = "  ".into();
        req.premium = String::new();
        let err = req.validate().unwrap_err().to_string();
        assert!(err.contains("airline"));
        assert!(err.contains("premium"));
        assert!(!err.contains("flight_number"));
    }

    #[test]
    fn test_from_request_keeps_form_metadata() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let record = PolicyRecord::from_request("0xabc", &request(), now);

        assert_eq!(record.flight_number, "AA123");
        assert_eq!(record.departure_time, "2026-10-20T14:30:00.000Z");
        assert_eq!(record.status, PolicyStatus::Active);
        assert!(!record.is_placeholder());
    }
}
