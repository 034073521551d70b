use once_cell::sync::Lazy;
use regex::Regex;

/// Formats a byte count as a human-readable string.
///
/// Steps through units B, KB, MB, GB, TB by dividing by 1024 until the value
/// drops below 1024. Byte counts are rendered without a decimal, everything
/// above with one decimal place.
///
/// # Example
///
/// ```
/// use rolika::core::utils::format_file_size;
///
/// assert_eq!(format_file_size(0), "0 B");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Formats a duration in seconds as `M:SS` or `H:MM:SS`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Formats a view count the way video sites display it: `123 views`,
/// `45.6K views`, `1.2M views`.
pub fn format_view_count(views: u64) -> String {
    if views >= 1_000_000 {
        format!("{:.1}M views", views as f64 / 1_000_000.0)
    } else if views >= 1_000 {
        format!("{:.1}K views", views as f64 / 1_000.0)
    } else {
        format!("{} views", views)
    }
}

/// Replaces characters that are unsafe in file names.
///
/// Strips the characters Windows and Unix filesystems choke on and replaces
/// path separators so a video title can never escape the download directory.
pub fn escape_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect()
}

/// Escapes special characters for Telegram MarkdownV2
pub fn escape_markdown(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('_', "\\_")
        .replace('*', "\\*")
        .replace('[', "\\[")
        .replace(']', "\\]")
        .replace('(', "\\(")
        .replace(')', "\\)")
        .replace('~', "\\~")
        .replace('`', "\\`")
        .replace('>', "\\>")
        .replace('#', "\\#")
        .replace('+', "\\+")
        .replace('-', "\\-")
        .replace('=', "\\=")
        .replace('|', "\\|")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('.', "\\.")
        .replace('!', "\\!")
}

/// Matches "Retry after 30s" and "retry_after: 30" shapes in Telegram errors
static RETRY_AFTER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)retry[ _]after:?\s*(\d+)").expect("Failed to compile retry-after regex"));

/// Extracts the `retry after N` seconds value from a Telegram error message,
/// if present. Used to wait out rate limits when editing progress messages.
pub fn extract_retry_after(error_text: &str) -> Option<u64> {
    RETRY_AFTER_REGEX
        .captures(error_text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== format_file_size Tests ====================

    #[test]
    fn test_format_file_size_zero() {
        assert_eq!(format_file_size(0), "0 B");
    }

    #[test]
    fn test_format_file_size_bytes() {
        assert_eq!(format_file_size(500), "500 B");
        assert_eq!(format_file_size(1023), "1023 B");
    }

    #[test]
    fn test_format_file_size_units() {
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_file_size(1_073_741_824), "1.0 GB");
        assert_eq!(format_file_size(1024 * 1024 * 1024 * 1024), "1.0 TB");
    }

    #[test]
    fn test_format_file_size_caps_at_tb() {
        // Values beyond TB stay in TB rather than inventing a unit
        assert_eq!(format_file_size(1024 * 1024 * 1024 * 1024 * 2048), "2048.0 TB");
    }

    #[test]
    fn test_format_file_size_unit_monotonic() {
        // Unit index never decreases as input grows
        let unit_rank = |s: &str| match s.rsplit(' ').next() {
            Some("B") => 0,
            Some("KB") => 1,
            Some("MB") => 2,
            Some("GB") => 3,
            Some("TB") => 4,
            _ => panic!("unexpected unit in {}", s),
        };
        let mut prev = 0;
        for exp in 0..50u32 {
            let rank = unit_rank(&format_file_size(2u64.pow(exp)));
            assert!(rank >= prev, "unit rank decreased at 2^{}", exp);
            prev = rank;
        }
    }

    // ==================== format_duration Tests ====================

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(61), "1:01");
        assert_eq!(format_duration(3600), "1:00:00");
        assert_eq!(format_duration(3725), "1:02:05");
    }

    // ==================== format_view_count Tests ====================

    #[test]
    fn test_format_view_count() {
        assert_eq!(format_view_count(0), "0 views");
        assert_eq!(format_view_count(999), "999 views");
        assert_eq!(format_view_count(1_500), "1.5K views");
        assert_eq!(format_view_count(2_300_000), "2.3M views");
    }

    // ==================== escape_filename Tests ====================

    #[test]
    fn test_escape_filename() {
        assert_eq!(escape_filename("song/name.mp3"), "song_name.mp3");
        assert_eq!(escape_filename(r#"a<b>c:d"e|f?g*h"#), "a_b_c_d_e_f_g_h");
        assert_eq!(escape_filename("plain name.mp4"), "plain name.mp4");
    }

    // ==================== escape_markdown Tests ====================

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("Hello World"), "Hello World");
        assert_eq!(escape_markdown("Test_file.mp3"), "Test\\_file\\.mp3");
        assert_eq!(escape_markdown("Song [2024]"), "Song \\[2024\\]");
    }

    #[test]
    fn test_escape_markdown_all_special() {
        let input = r"_*[]()~`>#+-=|{}.!";
        let expected = r"\_\*\[\]\(\)\~\`\>\#\+\-\=\|\{\}\.\!";
        assert_eq!(escape_markdown(input), expected);
    }

    // ==================== extract_retry_after Tests ====================

    #[test]
    fn test_extract_retry_after_standard() {
        assert_eq!(extract_retry_after("Retry after 30s"), Some(30));
        assert_eq!(extract_retry_after("retry after 60s"), Some(60));
    }

    #[test]
    fn test_extract_retry_after_colon_format() {
        assert_eq!(extract_retry_after("retry_after: 45"), Some(45));
        assert_eq!(extract_retry_after("retry_after:30"), Some(30));
    }

    #[test]
    fn test_extract_retry_after_no_match() {
        assert_eq!(extract_retry_after("No retry info"), None);
        assert_eq!(extract_retry_after(""), None);
    }
}
