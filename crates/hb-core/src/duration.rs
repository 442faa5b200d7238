//! Human-readable durations for chat messages.

/// Formats seconds as `{h}h {m}m`, or `{m}m` when under an hour.
///
/// Partial minutes are truncated; negative inputs render as `0m`.
pub fn format_duration(seconds: i64) -> String {
    let minutes = seconds.max(0) / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else {
        format!("{minutes}m")
    }
}
