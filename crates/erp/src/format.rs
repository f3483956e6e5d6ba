//! Markdown rendering helpers shared by the operation formatters.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserialize a result into its typed shape.
pub(crate) fn typed<T: DeserializeOwned>(value: &Value) -> Option<T> {
    T::deserialize(value).ok()
}

/// Rendering for results that do not have the expected shape.
pub(crate) fn fallback(value: &Value) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(json) => format!("```json\n{json}\n```"),
        Err(_) => value.to_string(),
    }
}

/// `1234567` → `1,234,567`.
pub fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

/// `₹` amount with two decimals and thousands separators.
pub fn money(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("{sign}₹{}.{:02}", thousands(cents / 100), cents % 100)
}

/// Whole-rupee amount.
pub fn rupees(amount: i64) -> String {
    format!("₹{}", thousands(amount))
}

/// Markdown table with a header row and alignment markers.
///
/// Columns whose marker ends with `:` are right-aligned.
pub(crate) fn table(columns: &[(&str, &str)], rows: impl IntoIterator<Item = Vec<String>>) -> String {
    let header: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let align: Vec<&str> = columns.iter().map(|(_, a)| *a).collect();
    let mut out = format!("| {} |\n|{}|", header.join(" | "), align.join("|"));
    for row in rows {
        out.push_str(&format!("\n| {} |", row.join(" | ")));
    }
    out
}

pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
        assert_eq!(thousands(-45000), "-45,000");
    }

    #[test]
    fn money_has_two_decimals() {
        assert_eq!(money(5000.0), "₹5,000.00");
        assert_eq!(money(1234.565), "₹1,234.57");
        assert_eq!(money(0.0), "₹0.00");
        assert_eq!(rupees(250000), "₹250,000");
    }

    #[test]
    fn tables_render_rows() {
        let t = table(&[("Item", ":--"), ("Qty", "--:")], vec![vec!["Desk".into(), "4".into()]]);
        assert_eq!(t, "| Item | Qty |\n|:--|--:|\n| Desk | 4 |");
    }

    #[test]
    fn capitalize_words() {
        assert_eq!(capitalize("east"), "East");
        assert_eq!(capitalize("NORTH"), "North");
        assert_eq!(capitalize(""), "");
    }
}
