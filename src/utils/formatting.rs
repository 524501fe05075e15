/// Format bytes in human-readable binary units (B, KB, MB, GB, TB)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}

/// Format a byte rate as bits per second
pub fn format_rate(bytes_per_sec: f64) -> String {
    const UNITS: &[&str] = &["bps", "Kbps", "Mbps", "Gbps"];
    let mut rate = bytes_per_sec * 8.0;
    let mut unit = 0;

    while rate >= 1000.0 && unit < UNITS.len() - 1 {
        rate /= 1000.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{:.0} {}", rate, UNITS[0])
    } else {
        format!("{:.2} {}", rate, UNITS[unit])
    }
}

/// Group digits in thousands: 1234567 -> "1,234,567"
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Format a capture span in seconds
pub fn format_duration(seconds: u64) -> String {
    match seconds {
        0..=59 => format!("{}s", seconds),
        60..=3599 => format!("{}m {}s", seconds / 60, seconds % 60),
        3600..=86399 => format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60),
        _ => format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600),
    }
}

/// Truncate to `max_len` characters, marking the cut with "..."
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{}...", kept)
}

/// Shorten long IPv6 addresses for table cells; empty addresses show as "-"
pub fn format_ip_address(addr: &str) -> String {
    if addr.is_empty() {
        return "-".to_string();
    }
    if addr.contains(':') && addr.len() > 24 {
        truncate_string(addr, 24)
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(350), "350 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(0.0), "0 bps");
        assert_eq!(format_rate(125.0), "1.00 Kbps");
        assert_eq!(format_rate(125000.0), "1.00 Mbps");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3661), "1h 1m");
        assert_eq!(format_duration(90061), "1d 1h");
    }

    #[test]
    fn test_truncate_and_ip() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(format_ip_address(""), "-");
        assert_eq!(format_ip_address("10.0.0.1"), "10.0.0.1");
        assert_eq!(
            format_ip_address("2001:0db8:85a3:0000:0000:8a2e:0370:7334"),
            "2001:0db8:85a3:0000:0..."
        );
    }
}
