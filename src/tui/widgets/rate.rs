use crate::model::DisplayMode;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Unit label for `bytes`: the largest of B/kB/MB/GB whose threshold
/// (1024^n) the value strictly exceeds.
pub fn size_unit(bytes: u64) -> &'static str {
    let b = bytes as f64;
    if b > GIB {
        "GB"
    } else if b > MIB {
        "MB"
    } else if b > KIB {
        "kB"
    } else {
        "B"
    }
}

/// `bytes` converted into the unit chosen by [`size_unit`], truncated (not
/// rounded) to one decimal.
pub fn scale_size(bytes: u64) -> f64 {
    let b = bytes as f64;
    let scaled = if b > GIB {
        b / GIB
    } else if b > MIB {
        b / MIB
    } else if b > KIB {
        b / KIB
    } else {
        b
    };
    (scaled * 10.0).floor() / 10.0
}

/// Formats a byte count for display, with a `/s` suffix in rate mode.
///
/// Output examples: `"0.0 B/s"`, `"1.5 kB/s"`, `"1.5 kB"`, `"23.4 MB"`.
pub fn format_size(bytes: u64, mode: DisplayMode) -> String {
    let suffix = match mode {
        DisplayMode::Rate => "/s",
        DisplayMode::Total => "",
    };
    format!("{:.1} {}{suffix}", scale_size(bytes), size_unit(bytes))
}

/// Formats the monitored process's operation time: `h:mm:ss`, or `mm:ss`
/// under an hour. Seconds are rounded to the nearest integer.
pub fn format_uptime(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// The `:port` part of a target, `":80"` when none is given.
pub fn target_port(target: &str) -> &str {
    match target.rfind(':') {
        Some(i) => &target[i..],
        None => ":80",
    }
}
