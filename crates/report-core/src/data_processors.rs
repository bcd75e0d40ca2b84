use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

// ── CountExtractor ────────────────────────────────────────────────────────────

/// Reads event counts out of loosely-typed analytics rows.
///
/// The analytics endpoints are not consistent about number encoding: counts
/// arrive as integers, floats, numeric strings, `null`, or not at all.
pub struct CountExtractor;

impl CountExtractor {
    /// Coerce a JSON value into a non-negative count.
    ///
    /// * integer          → itself (negatives clamp to `0`)
    /// * float            → truncated, `0` when not finite or negative
    /// * numeric string   → parsed the same way
    /// * anything else    → `0`
    pub fn coerce(value: &Value) -> u64 {
        match value {
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    v
                } else if let Some(f) = n.as_f64() {
                    Self::from_f64(f)
                } else {
                    0
                }
            }
            Value::String(s) => Self::parse_str(s),
            _ => 0,
        }
    }

    /// Return the first present key among `keys`, coerced.
    ///
    /// A missing field counts as `0`.
    pub fn find(obj: &Value, keys: &[&str]) -> u64 {
        for &key in keys {
            if let Some(v) = obj.get(key) {
                return Self::coerce(v);
            }
        }
        0
    }

    fn parse_str(s: &str) -> u64 {
        let trimmed = s.trim();
        if let Ok(v) = trimmed.parse::<u64>() {
            return v;
        }
        match trimmed.parse::<f64>() {
            Ok(f) => Self::from_f64(f),
            Err(_) => {
                debug!("CountExtractor: non-numeric count \"{}\" treated as 0", s);
                0
            }
        }
    }

    fn from_f64(f: f64) -> u64 {
        if f.is_finite() && f > 0.0 {
            f.trunc() as u64
        } else {
            0
        }
    }
}

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Parses the timestamp strings found in component metadata.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Parse an ISO 8601 / RFC 3339 string (or a bare date) into UTC.
    pub fn parse_str(s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }

        const FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
        ];

        for fmt in FORMATS {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&naive));
        }

        debug!("TimestampProcessor: could not parse timestamp \"{}\"", s);
        None
    }

    /// Render a source timestamp as `YYYY-MM-DD`.
    ///
    /// Unparseable input is returned unchanged so nothing is silently lost
    /// from the report.
    pub fn format_date(s: &str) -> String {
        match Self::parse_str(s) {
            Some(dt) => dt.format("%Y-%m-%d").to_string(),
            None => s.to_string(),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
