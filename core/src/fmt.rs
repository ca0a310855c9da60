use std::time::Duration;

///
/// Consistent formatting for durations and per-row rates in log output.
///
/// `format_duration` would show micro/nanoseconds; rounded to ms precision,
/// which is all phase-timing logs need.
///
pub fn formatted_duration_rate(amount: usize, elapsed: Duration) -> (String, String) {
    let duration = Duration::new(elapsed.as_secs(), elapsed.subsec_millis() * 1_000_000);
    let rate = elapsed.as_millis() as f64 / amount.max(1) as f64;
    (humantime::format_duration(duration).to_string(), format!("{rate:.3}ms"))
}

///
/// Highlight some log output with ansi colour codes.
///
pub fn blue(msg: &str) -> ansi_term::ANSIGenericString<'_, str> {
    ansi_term::Colour::RGB(70, 130, 180).paint(msg)
}
