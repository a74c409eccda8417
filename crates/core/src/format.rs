/// Render a duration in seconds as `"{h}h {mm}min"`.
///
/// Minutes are truncated, never rounded up, so `90` renders as `"0h 01min"`
/// and anything under a minute renders as the zero state `"0h 00min"`.
#[must_use]
pub fn format_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    format!("{hours}h {minutes:02}min")
}
