//! Field and text normalisation applied before scoring.
//!
//! All comparisons downstream are exact string equality, so everything that
//! should count as "the same value" has to collapse to one spelling here.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Currency markers, thousands separators and whitespace stripped from totals.
fn currency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SGD|[RM$£€¥₹,\s]").expect("static regex"))
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\p{P}").expect("static regex"))
}

/// Shape check paired with the chrono format that parses it. The shape guard
/// keeps `%Y` from accepting a two-digit year.
struct DatePattern {
    shape: &'static str,
    format: &'static str,
}

const DATE_PATTERNS: &[DatePattern] = &[
    DatePattern { shape: r"^\d{1,2}-\d{1,2}-\d{4}$", format: "%d-%m-%Y" },
    DatePattern { shape: r"^\d{1,2}/\d{1,2}/\d{4}$", format: "%d/%m/%Y" },
    DatePattern { shape: r"^\d{4}-\d{1,2}-\d{1,2}$", format: "%Y-%m-%d" },
    DatePattern { shape: r"^\d{1,2}-\d{1,2}-\d{2}$", format: "%d-%m-%y" },
    DatePattern { shape: r"^\d{1,2}/\d{1,2}/\d{2}$", format: "%d/%m/%y" },
    DatePattern { shape: r"(?i)^\d{1,2} [a-z]{3} \d{2}$", format: "%d %b %y" },
    DatePattern { shape: r"(?i)^\d{1,2} [a-z]+ \d{4}$", format: "%d %B %Y" },
    DatePattern { shape: r"(?i)^[a-z]+ \d{1,2}, \d{4}$", format: "%B %d, %Y" },
    DatePattern { shape: r"(?i)^[a-z]+ \d{1,2} \d{4}$", format: "%B %d %Y" },
];

fn date_shapes() -> &'static [Regex] {
    static SHAPES: OnceLock<Vec<Regex>> = OnceLock::new();
    SHAPES.get_or_init(|| {
        DATE_PATTERNS
            .iter()
            .map(|p| Regex::new(p.shape).expect("static regex"))
            .collect()
    })
}

/// `"RM 1,234.50"` -> `"1234.50"`. Keeps digits and the first decimal point.
pub fn normalize_total(value: &str) -> String {
    let stripped = currency_re().replace_all(value, "");
    let mut out = String::with_capacity(stripped.len());
    let mut seen_point = false;
    for c in stripped.chars() {
        if c.is_ascii_digit() {
            out.push(c);
        } else if c == '.' && !seen_point {
            out.push(c);
            seen_point = true;
        }
    }
    out
}

/// Parse against the known receipt date layouts and render `YYYY-MM-DD`.
/// Unparseable input falls back to its digits, `/` and `-` only.
pub fn normalize_date(value: &str) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    for (pattern, shape) in DATE_PATTERNS.iter().zip(date_shapes()) {
        if !shape.is_match(&collapsed) {
            continue;
        }
        if let Ok(date) = NaiveDate::parse_from_str(&collapsed, pattern.format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    collapsed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '/' || *c == '-')
        .collect::<String>()
        .to_lowercase()
}

pub fn normalize_text(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Normalise a receipt field by name; unknown fields get the plain text rule.
pub fn normalize_field(field: &str, value: &str) -> String {
    match field {
        "total" => normalize_total(value),
        "date" => normalize_date(value),
        _ => normalize_text(value),
    }
}

/// Transcription normalisation for CER/WER: lower-case, no punctuation,
/// single spaces, trimmed. Line breaks become word separators.
pub fn normalize_transcript(text: &str) -> String {
    let lower = text.to_lowercase();
    let no_punct = punctuation_re().replace_all(&lower, "");
    no_punct.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_with_currency_collapse() {
        assert_eq!(normalize_total("RM 1,234.50"), "1234.50");
        assert_eq!(normalize_total("$1234.50"), "1234.50");
        assert_eq!(normalize_total("SGD 12.00"), "12.00");
        assert_eq!(normalize_total("€ 3.10"), "3.10");
    }

    #[test]
    fn total_keeps_single_decimal_point() {
        assert_eq!(normalize_total("1.234.50"), "1.23450");
        assert_eq!(normalize_total("TOTAL: 9"), "9");
    }

    #[test]
    fn numeric_dates_render_iso() {
        assert_eq!(normalize_date("14-06-2018"), "2018-06-14");
        assert_eq!(normalize_date("14/06/2018"), "2018-06-14");
        assert_eq!(normalize_date("2018-06-14"), "2018-06-14");
        assert_eq!(normalize_date("14/06/18"), "2018-06-14");
        assert_eq!(normalize_date("4-6-18"), "2018-06-04");
    }

    #[test]
    fn named_month_dates_are_case_insensitive() {
        assert_eq!(normalize_date("14 JUN 18"), "2018-06-14");
        assert_eq!(normalize_date("14 june 2018"), "2018-06-14");
        assert_eq!(normalize_date("June 14, 2018"), "2018-06-14");
        assert_eq!(normalize_date("JUNE 14 2018"), "2018-06-14");
        assert_eq!(normalize_date("  14   Jun   18 "), "2018-06-14");
    }

    #[test]
    fn unparseable_dates_fall_back_to_digits() {
        assert_eq!(normalize_date("Date: 14.06.2018"), "14062018");
        assert_eq!(normalize_date("31/02/2018"), "31/02/2018");
        assert_eq!(normalize_date("yesterday"), "");
    }

    #[test]
    fn text_fields_trim_and_fold() {
        assert_eq!(normalize_field("company", "  SYARIKAT  Perniagaan "), "syarikat  perniagaan");
        assert_eq!(normalize_field("total", "RM9.00"), "9.00");
    }

    #[test]
    fn transcript_drops_punctuation_and_collapses_space() {
        assert_eq!(normalize_transcript("TOTAL:  RM 9.00\nThank you!"), "total rm 900 thank you");
    }
}
