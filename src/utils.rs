/// Formats an optional f64 to 4 decimal places, or returns "—" if None or non-finite.
pub fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.4}"),
        _ => "—".to_owned(),
    }
}

/// Renders a number the way it is shown as a category label: integral values
/// lose their fractional part, everything else uses the shortest round-trip form.
pub fn format_number_label(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        v.to_string()
    }
}

/// Formats a 0..=1 ratio as a percentage with one decimal.
pub fn fmt_pct(v: f64) -> String {
    format!("{:.1}%", v * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_opt() {
        assert_eq!(fmt_opt(Some(0.123_456)), "0.1235");
        assert_eq!(fmt_opt(Some(f64::NAN)), "—");
        assert_eq!(fmt_opt(None), "—");
    }

    #[test]
    fn test_format_number_label() {
        assert_eq!(format_number_label(3.0), "3");
        assert_eq!(format_number_label(-2.0), "-2");
        assert_eq!(format_number_label(0.25), "0.25");
    }
}
