use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Format an integer count with thousands separators.
///
/// ```
/// use report_core::formatting::format_count;
///
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// assert_eq!(format_count(12), "12");
/// ```
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Format elapsed seconds as `HH:MM:SS`.
///
/// ```
/// use report_core::formatting::format_duration_hms;
///
/// assert_eq!(format_duration_hms(0.0), "00:00:00");
/// assert_eq!(format_duration_hms(3725.4), "01:02:05");
/// ```
pub fn format_duration_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Turn a library display name into a file-name-safe slug.
///
/// Accents are dropped, every run of characters outside
/// `[a-z0-9]` collapses into a single `_`, leading/trailing underscores are
/// trimmed and the result is lowercased.
///
/// ```
/// use report_core::formatting::normalize_name;
///
/// assert_eq!(normalize_name("Biblioteca Padrão | Web"), "biblioteca_padrao_web");
/// assert_eq!(normalize_name("  ✨ Core UI ✨ "), "core_ui");
/// ```
pub fn normalize_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in strip_diacritics(name).chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    slug
}

/// Remove combining marks after canonical decomposition, so `"Ícone"`
/// becomes `"Icone"` and `"ș"` becomes `"s"`.
///
/// ```
/// use report_core::formatting::strip_diacritics;
///
/// assert_eq!(strip_diacritics("Botão Őrség"), "Botao Orseg");
/// ```
pub fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Primary sort key for display names: accent- and case-insensitive.
///
/// Names equal under this key still need a tie-break to form a total order.
pub fn collation_key(name: &str) -> String {
    strip_diacritics(name).to_lowercase()
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────
