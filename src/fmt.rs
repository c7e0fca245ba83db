use chrono::Duration;

fn with_commas(int_part: &str) -> String {
    let mut out = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.chars().rev().collect()
}

/// Format minor units with thousands separators: 123456 -> "1,234.56"
pub fn money(minor: i64) -> String {
    let negative = minor < 0;
    let abs = minor.unsigned_abs();
    let int_part = (abs / 100).to_string();
    let dec_part = abs % 100;
    let body = format!("{}.{dec_part:02}", with_commas(&int_part));
    if negative {
        format!("-{body}")
    } else {
        body
    }
}

/// Play-money amount with up to eight decimals, trailing zeros trimmed.
pub fn play(val: f64) -> String {
    let s = format!("{val:.8}");
    let s = s.trim_end_matches('0');
    if let Some(stripped) = s.strip_suffix('.') {
        format!("{stripped}.0")
    } else {
        s.to_string()
    }
}

pub fn format_bytes(size: u64) -> String {
    if size < 1024 {
        format!("{size} B")
    } else if size < 1024 * 1024 {
        format!("{:.1} KB", size as f64 / 1024.0)
    } else {
        format!("{:.1} MB", size as f64 / (1024.0 * 1024.0))
    }
}

/// Compact "2h 5m" style duration; seconds only when under a minute.
pub fn short_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    let h = secs / 3600;
    let m = (secs / 60) % 60;
    let s = secs % 60;
    let mut parts = Vec::new();
    if h > 0 {
        parts.push(format!("{h}h"));
    }
    if m > 0 {
        parts.push(format!("{m}m"));
    }
    if h == 0 && m == 0 {
        parts.push(format!("{s}s"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(123456), "1,234.56");
        assert_eq!(money(-50000), "-500.00");
        assert_eq!(money(0), "0.00");
        assert_eq!(money(100000099), "1,000,000.99");
        assert_eq!(money(4210), "42.10");
    }

    #[test]
    fn test_play_formatting() {
        assert_eq!(play(0.0), "0.0");
        assert_eq!(play(0.01), "0.01");
        assert_eq!(play(5.0), "5.0");
        assert_eq!(play(0.00000125), "0.00000125");
    }

    #[test]
    fn test_short_duration() {
        assert_eq!(short_duration(Duration::hours(3)), "3h");
        assert_eq!(short_duration(Duration::seconds(3725)), "1h 2m");
        assert_eq!(short_duration(Duration::seconds(42)), "42s");
        assert_eq!(short_duration(Duration::seconds(-5)), "0s");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
