//! File names and captions for delivered artifacts.

const FORBIDDEN: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Strips characters that are unsafe in file names. Falls back to "media" when nothing is left.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !FORBIDDEN.contains(c)).collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "media".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `mm:ss`, or `hh:mm:ss` once there is at least one hour.
pub fn format_duration(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Three-line caption: file name, quality line, source reference.
pub fn caption(file_name: &str, quality_line: &str, reference: &str) -> String {
    format!("{file_name}\n{quality_line}\n{reference}")
}
