use chrono::{DateTime, Utc};

/// Currency all amounts are denominated in.
pub const CURRENCY: &str = "KES";

/// Format an amount for display, e.g. `KES 12,500.00`.
pub fn format_amount(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{} {}.{}", sign, CURRENCY, grouped, cents)
}

/// Format a Kenyan mobile number for display
/// Normalizes 2547XXXXXXXX / 07XXXXXXXX to +254 7XX XXX XXX
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    let local = match digits.len() {
        12 if digits.starts_with("254") => &digits[3..],
        10 if digits.starts_with('0') => &digits[1..],
        _ => return phone.to_string(), // Return original if can't format
    };

    format!("+254 {} {} {}", &local[0..3], &local[3..6], &local[6..9])
}

/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%b %d, %Y").to_string()
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}
