//! Shared field normalization used by every site extractor.
//!
//! Prices arrive as "278.00 MDL / шт.", "1 234,5 лей", "1,234.56" and so on;
//! the sheet wants one canonical decimal-comma form ("278,00", "1234,5").
//! Titles get the domain's historical cleanup: LED wording, watt units and
//! dimension separators are unified across language variants.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::product::{ProductRecord, FIELD_TITLE};

/// "Светодиодный"/"светодиодная"/… in any inflection.
static LED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[Сс]ветодиодн\S*").expect("LED regex is valid"));

/// First number in a text label, e.g. "Найдено 1234 товаров".
static FIRST_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("regex is valid"));

/// Normalize a raw price string to the canonical decimal-comma form.
///
/// Currency suffixes and per-unit tails are cut, thousands separators
/// dropped, and the decimal separator (the last `.` or `,` followed by at
/// most two digits) becomes a comma. Returns `None` when no digits remain.
/// Idempotent: normalizing an already-normalized price is a no-op.
pub fn normalize_price(raw: &str) -> Option<String> {
    // Cut at the first currency/unit marker.
    let mut cut = raw;
    for marker in ["лей", "MDL", "/"] {
        if let Some(pos) = cut.find(marker) {
            cut = &cut[..pos];
        }
    }

    // Keep digits and separators only; spaces and apostrophes are
    // thousands separators on these sites.
    let cleaned: String = cut
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    // The last separator with 1-2 trailing digits is the decimal point;
    // every other separator is a thousands separator.
    let decimal_pos = cleaned
        .rfind(['.', ','])
        .filter(|&pos| {
            let tail = &cleaned[pos + 1..];
            !tail.is_empty() && tail.len() <= 2 && tail.chars().all(|c| c.is_ascii_digit())
        });

    let mut out = String::with_capacity(cleaned.len());
    for (i, c) in cleaned.char_indices() {
        match c {
            '.' | ',' => {
                if Some(i) == decimal_pos {
                    out.push(',');
                }
            }
            digit => out.push(digit),
        }
    }
    Some(out)
}

/// Apply the domain's title cleanup: "Светодиодн…" → "LED", "Вт" → "W",
/// "*" → "x".
pub fn normalize_title(title: &str) -> String {
    let led = LED_RE.replace_all(title, "LED");
    led.replace("Вт", "W").replace('*', "x")
}

/// Normalize the record's title field in place, if present.
pub fn normalize_record_title(record: &mut ProductRecord) {
    if let Some(title) = record.title().map(normalize_title) {
        record.set(FIELD_TITLE, title);
    }
}

/// Extract the first integer from a text label such as a total-items counter.
pub fn first_number(text: &str) -> Option<u32> {
    FIRST_NUMBER_RE
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

/// Collapse internal whitespace runs the way `get_text(strip=True)` does.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("278.00 MDL / шт.", "278,00")]
    #[case("12,50 лей", "12,50")]
    #[case("1 234.56 лей", "1234,56")]
    #[case("1,234.56", "1234,56")]
    #[case("1.234,56", "1234,56")]
    #[case("99", "99")]
    #[case("105.5", "105,5")]
    #[case("2 097", "2097")]
    fn price_forms(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_price(raw).as_deref(), Some(expected));
    }

    #[test]
    fn price_without_digits_is_none() {
        assert_eq!(normalize_price("по запросу"), None);
        assert_eq!(normalize_price(""), None);
    }

    #[rstest]
    #[case("278,00")]
    #[case("1234,5")]
    #[case("99")]
    fn price_normalization_is_idempotent(#[case] canonical: &str) {
        let once = normalize_price(canonical).unwrap();
        assert_eq!(once, canonical);
        assert_eq!(normalize_price(&once).unwrap(), once);
    }

    #[test]
    fn messy_price_is_idempotent_after_first_pass() {
        let once = normalize_price("1 234.56 лей / м").unwrap();
        assert_eq!(normalize_price(&once).unwrap(), once);
    }

    #[test]
    fn title_cleanup() {
        assert_eq!(
            normalize_title("Светодиодная лампа 10Вт 60*120"),
            "LED лампа 10W 60x120"
        );
        assert_eq!(normalize_title("светодиодный прожектор"), "LED прожектор");
        assert_eq!(normalize_title("Кабель ВВГ"), "Кабель ВВГ");
    }

    #[test]
    fn record_title_normalized_in_place() {
        let mut record = ProductRecord::new();
        record.insert(FIELD_TITLE, "Светодиодный светильник 18Вт");
        normalize_record_title(&mut record);
        assert_eq!(record.title(), Some("LED светильник 18W"));
    }

    #[test]
    fn first_number_from_label() {
        assert_eq!(first_number("Найдено 1234 товаров"), Some(1234));
        assert_eq!(first_number("нет товаров"), None);
    }

    #[test]
    fn whitespace_collapse() {
        assert_eq!(collapse_whitespace("  a \n b\t c  "), "a b c");
    }
}
