use chrono::{Local, Offset};

/// Formats a UTC offset as `GMT+N` / `GMT-N` in whole hours truncated toward zero.
///
/// Sub-hour zones keep their whole-hour part, so `+05:30` becomes `GMT+5` and `-03:30`
/// becomes `GMT-3`. Any offset under one hour either way renders as plain `GMT`.
pub fn timezone_offset_label(offset_seconds: i32) -> String {
    let hours = offset_seconds / 3_600;
    match hours {
        0 => "GMT".to_string(),
        positive if positive > 0 => format!("GMT+{positive}"),
        negative => format!("GMT{negative}"),
    }
}

/// Offset label for the host's local time zone right now.
pub fn local_timezone_offset() -> String {
    let offset_seconds = Local::now().offset().fix().local_minus_utc();
    timezone_offset_label(offset_seconds)
}
