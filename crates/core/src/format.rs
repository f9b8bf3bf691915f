//! Parsing of raw form input and pt-BR rendering of numbers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::{DisplayKind, InputField, InputKind, OutputField};

static DECORATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)r\$|\$|%|\s").expect("invalid decoration regex"));
static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9.,]*[0-9][0-9.,]*$").expect("invalid numeric regex"));

/// Parse a raw form value. Anything that is not a finite number becomes `0.0`.
pub fn parse_input(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<f64>() {
        if value.is_finite() {
            return value;
        }
    }
    parse_localized(trimmed).unwrap_or(0.0)
}

/// Lenient parser for localized amounts such as `R$ 1.234,56` or `12,5%`.
pub fn parse_localized(raw: &str) -> Option<f64> {
    let cleaned = DECORATION_RE.replace_all(raw, "");
    if !NUMERIC_RE.is_match(&cleaned) {
        return None;
    }

    let dots = cleaned.matches('.').count();
    let commas = cleaned.matches(',').count();
    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) if commas > 1 => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        (Some(_), None) if dots > 1 => cleaned.replace('.', ""),
        _ => cleaned.into_owned(),
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Two fraction digits, `.` for thousands and `,` for decimals.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "0,00".to_string();
    }

    let fixed = format!("{:.2}", value.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (idx, ch) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let is_zero = integer.chars().all(|ch| ch == '0') && fraction.chars().all(|ch| ch == '0');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };
    format!("{sign}{grouped},{fraction}")
}

/// Exact plain text for an edit buffer: no grouping, `,` as the decimal mark.
///
/// Feeding the result back through [`parse_input`] yields the same value.
pub fn format_editable(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    value.to_string().replace('.', ",")
}

/// `R$` amount.
pub fn format_currency(value: f64) -> String {
    format!("R$ {}", format_number(value))
}

/// Percentage with a trailing `%`.
pub fn format_percentage(value: f64) -> String {
    format!("{}%", format_number(value))
}

/// Payback period.
pub fn format_months(value: f64) -> String {
    format!("{} meses", format_number(value))
}

/// Render an input value for the form.
pub fn format_input(field: &InputField, value: f64) -> String {
    match field.kind {
        InputKind::Currency => format_number(value),
        InputKind::Percentage => format_percentage(value),
    }
}

/// Render a derived metric for its card.
pub fn format_output(field: &OutputField, value: f64) -> String {
    match field.display {
        DisplayKind::Currency => format_currency(value),
        DisplayKind::Percentage => format_percentage(value),
        DisplayKind::Months => format_months(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{input_field, output_field};

    #[test]
    fn non_numeric_input_becomes_zero() {
        for raw in ["", "abc", "12abc", "--", "NaN", "inf", "-infinity", "R$", "1.2.3,4,5"] {
            assert_eq!(parse_input(raw), 0.0, "input {raw:?}");
        }
    }

    #[test]
    fn plain_numbers_parse_directly() {
        assert_eq!(parse_input("12.5"), 12.5);
        assert_eq!(parse_input("  -3 "), -3.0);
        assert_eq!(parse_input("1e3"), 1000.0);
    }

    #[test]
    fn localized_amounts_parse() {
        assert_eq!(parse_input("R$ 1.234,56"), 1234.56);
        assert_eq!(parse_input("12,5%"), 12.5);
        assert_eq!(parse_input("1,234.56"), 1234.56);
        assert_eq!(parse_input("1.234.567"), 1_234_567.0);
        assert_eq!(parse_input("1,234,567"), 1_234_567.0);
        assert_eq!(parse_localized("$ 10"), Some(10.0));
        assert_eq!(parse_localized("abc"), None);
    }

    #[test]
    fn numbers_render_in_pt_br() {
        assert_eq!(format_number(1234.5), "1.234,50");
        assert_eq!(format_number(1_234_567.891), "1.234.567,89");
        assert_eq!(format_number(999.999), "1.000,00");
        assert_eq!(format_number(-0.5), "-0,50");
        assert_eq!(format_number(-0.001), "0,00");
        assert_eq!(format_number(f64::NAN), "0,00");
        assert_eq!(format_number(0.0), "0,00");
    }

    #[test]
    fn edit_text_parses_back_to_the_same_value() {
        for value in [1500.0, 0.125, 1_234_567.891, -42.75, 0.0, 1e-7, 3.0e15] {
            let text = format_editable(value);
            assert_eq!(parse_input(&text), value, "edit text {text:?}");
        }
        assert_eq!(format_editable(1500.0), "1500");
        assert_eq!(format_editable(0.125), "0,125");
        assert_eq!(format_editable(f64::INFINITY), "0");

        // Grouped display text is not a safe prefill: "1.500" reads as 1.5.
        let grouped = format_number(1500.0);
        assert_eq!(parse_input(grouped.trim_end_matches(",00")), 1.5);
        assert_eq!(parse_input(&format_editable(1500.0)), 1500.0);
    }

    #[test]
    fn kinds_pick_their_renderer() {
        let roi = output_field("roi").expect("roi");
        let payback = output_field("meses_payback").expect("payback");
        let lucro = output_field("lucro_liquido").expect("lucro");
        assert_eq!(format_output(roi, 18.0), "18,00%");
        assert_eq!(format_output(payback, 24.0), "24,00 meses");
        assert_eq!(format_output(lucro, 1500.0), "R$ 1.500,00");

        let area = input_field("metragem_terreno").expect("area");
        let fee = input_field("taxa_performance").expect("fee");
        assert_eq!(format_input(area, 450.0), "450,00");
        assert_eq!(format_input(fee, 2.5), "2,50%");
    }
}
