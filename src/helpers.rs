use chrono::{DateTime, Utc};

/// Parse a Kubernetes RFC 3339 timestamp ("2024-06-01T12:30:00Z").
pub fn parse_k8s_time(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts).ok().map(|dt| dt.to_utc())
}
