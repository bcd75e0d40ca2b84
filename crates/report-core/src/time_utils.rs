use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── ReportClock ───────────────────────────────────────────────────────────────

/// Renders the generation instant of a report in the configured timezone.
///
/// Report file names, the Markdown summary and the workspace mirror all
/// take their dates from the same clock so one run never straddles two
/// different "today"s.
#[derive(Debug, Clone)]
pub struct ReportClock {
    tz: Tz,
}

impl ReportClock {
    /// Create a clock for the given IANA timezone name.
    ///
    /// `"auto"` resolves to the system timezone; an unrecognised name falls
    /// back to UTC with a warning.
    pub fn new(tz_name: &str) -> Self {
        let resolved = if tz_name == "auto" {
            get_system_timezone()
        } else {
            tz_name.to_string()
        };
        let tz = resolved.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "ReportClock: unrecognised timezone \"{}\", falling back to UTC",
                resolved
            );
            Tz::UTC
        });
        Self { tz }
    }

    /// The configured timezone.
    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Current instant in the configured timezone.
    pub fn now(&self) -> DateTime<Tz> {
        self.at(Utc::now())
    }

    /// Convert a UTC instant into the configured timezone.
    pub fn at(&self, dt: DateTime<Utc>) -> DateTime<Tz> {
        dt.with_timezone(&self.tz)
    }

    /// Calendar date of `now()`.
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// `YYYY-MM-DD HH:MM:SS`, used in the Markdown summary.
pub fn format_generation_date(dt: &DateTime<Tz>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `YYYY-MM-DD_HH-MM-SS`, safe for file names.
pub fn format_file_timestamp(dt: &DateTime<Tz>) -> String {
    dt.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// `YYYY-MM-DD - HH-MM`, used in remote database titles.
pub fn format_title_timestamp(dt: &DateTime<Tz>) -> String {
    dt.format("%Y-%m-%d - %H-%M").to_string()
}

/// Validate that `tz_name` is a recognised IANA timezone identifier.
pub fn validate_timezone(tz_name: &str) -> bool {
    tz_name == "auto" || tz_name.parse::<Tz>().is_ok()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
