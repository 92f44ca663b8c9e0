//! Wire-format helpers for carrier field conventions.

use chrono::NaiveDate;

/// Blue Dart volumetric divisor.
const VOLUMETRIC_DIVISOR: f64 = 5000.0;

/// Volumetric weight in kg from centimeter dimensions.
pub fn volumetric_weight(length_cm: f64, width_cm: f64, height_cm: f64) -> f64 {
    length_cm * width_cm * height_cm / VOLUMETRIC_DIVISOR
}

/// Billable weight: the higher of actual and volumetric.
pub fn billable_weight(actual_kg: f64, length_cm: f64, width_cm: f64, height_cm: f64) -> f64 {
    actual_kg.max(volumetric_weight(length_cm, width_cm, height_cm))
}

/// Truncates a free-form value to a field length limit, marking the cut with
/// an ellipsis.
pub fn truncate_field(value: &str, max_len: usize) -> String {
    let value = value.trim();
    if value.chars().count() <= max_len {
        return value.to_string();
    }
    let kept: String = value.chars().take(max_len.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Splits an address into three lines of 30/30/25 characters, packing whole
/// words greedily. Words that no longer fit are dropped.
pub fn split_address(full_address: &str) -> (String, String, String) {
    let mut lines = [
        (String::new(), 30usize),
        (String::new(), 30),
        (String::new(), 25),
    ];

    'words: for word in full_address.replace(',', " ").split_whitespace() {
        for (line, max) in lines.iter_mut() {
            let needed = if line.is_empty() {
                word.chars().count()
            } else {
                line.chars().count() + 1 + word.chars().count()
            };
            if needed <= *max {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(word);
                continue 'words;
            }
        }
        break;
    }

    let [l1, l2, l3] = lines;
    (l1.0, l2.0, l3.0)
}

/// Normalizes a phone number for carrier fields: strips `+91`, dashes and
/// spaces, then keeps the first ten characters.
pub fn normalize_phone(phone: &str) -> String {
    phone
        .replace("+91", "")
        .replace(['-', ' '], "")
        .chars()
        .take(10)
        .collect()
}

/// Parses the carrier's display date (`DD-MON-YY`, occasionally with a full
/// year).
pub fn parse_display_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%d-%b-%y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d-%b-%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billable_weight_uses_volumetric_when_higher() {
        // 40x40x40 / 5000 = 12.8 kg volumetric
        assert_eq!(billable_weight(5.0, 40.0, 40.0, 40.0), 12.8);
        // Small box, actual wins
        assert_eq!(billable_weight(5.0, 10.0, 10.0, 10.0), 5.0);
    }

    #[test]
    fn truncate_leaves_short_values_alone() {
        assert_eq!(truncate_field("14 MG Road", 30), "14 MG Road");
    }

    #[test]
    fn truncate_marks_the_cut() {
        let long = "Apartment 4B Green Meadows Residency Phase Two";
        let out = truncate_field(long, 30);
        assert_eq!(out.chars().count(), 30);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn split_address_packs_words_greedily() {
        let (l1, l2, l3) =
            split_address("Flat 12, Silver Oak Apartments, 14th Cross, Indiranagar Stage 2");
        assert!(l1.chars().count() <= 30);
        assert!(l2.chars().count() <= 30);
        assert!(l3.chars().count() <= 25);
        assert_eq!(l1, "Flat 12 Silver Oak Apartments");
        assert!(!l2.is_empty());
    }

    #[test]
    fn split_address_empty() {
        assert_eq!(
            split_address(""),
            (String::new(), String::new(), String::new())
        );
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(normalize_phone("+91-98765 43210"), "9876543210");
        assert_eq!(normalize_phone("9876543210"), "9876543210");
        assert_eq!(normalize_phone("+91 98765-43210-99"), "9876543210");
    }

    #[test]
    fn display_date_two_digit_year() {
        assert_eq!(
            parse_display_date("12-Feb-26"),
            NaiveDate::from_ymd_opt(2026, 2, 12)
        );
    }

    #[test]
    fn display_date_full_year() {
        assert_eq!(
            parse_display_date("01-Dec-2026"),
            NaiveDate::from_ymd_opt(2026, 12, 1)
        );
    }

    #[test]
    fn display_date_garbage_is_none() {
        assert_eq!(parse_display_date(""), None);
        assert_eq!(parse_display_date("tomorrow"), None);
    }
}
