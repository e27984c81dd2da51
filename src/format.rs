/// Renders a seconds value the way the summary table prints it: `4.07s`,
/// `2m 05s`, `1h 03m 20s`.
pub fn format_seconds(seconds: f64) -> String {
    let seconds = if seconds.is_finite() && seconds > 0.0 { seconds } else { 0.0 };
    if seconds < 60.0 {
        return format!("{:.2}s", seconds);
    }
    let whole = seconds.round() as u64;
    let (hours, rest) = (whole / 3600, whole % 3600);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, rest / 60, rest % 60)
    } else {
        format!("{}m {:02}s", rest / 60, rest % 60)
    }
}

/// Signed percentage change from `before` to `after`, or `None` when there
/// is no meaningful baseline.
pub fn percent_change(before: f64, after: f64) -> Option<f64> {
    if before > 0.0 && before.is_finite() && after.is_finite() {
        Some((after - before) / before * 100.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sub_minute_keeps_hundredths() {
        assert_eq!(format_seconds(0.0), "0.00s");
        assert_eq!(format_seconds(12.346), "12.35s");
        assert_eq!(format_seconds(59.5), "59.50s");
    }
    #[test]
    fn test_minutes_and_hours() {
        assert_eq!(format_seconds(65.0), "1m 05s");
        assert_eq!(format_seconds(600.4), "10m 00s");
        assert_eq!(format_seconds(3800.0), "1h 03m 20s");
    }
    #[test]
    fn test_garbage_input_clamps_to_zero() {
        assert_eq!(format_seconds(-3.0), "0.00s");
        assert_eq!(format_seconds(f64::NAN), "0.00s");
    }
    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(10.0, 12.0), Some(20.0));
        assert_eq!(percent_change(0.0, 12.0), None);
    }
}
