pub fn format_error_message(message: &str) -> String {
    format!("❌ {}", message)
}

pub fn format_success_message(message: &str) -> String {
    format!("✅ {}", message)
}

pub fn format_warning_message(message: &str) -> String {
    format!("⚠️ {}", message)
}

pub fn format_status_message(message: &str) -> String {
    format!("📊 {}", message)
}

/// Cuts a commit message down to its first line, at most `max_chars` characters.
pub fn truncate_first_line(message: &str, max_chars: usize) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    if first_line.chars().count() > max_chars {
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        first_line.to_string()
    }
}

pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
