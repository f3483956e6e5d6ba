//! Record id normalisation.

/// `30001`, `item-30001` and `ITEM-30001` all become `ITEM-30001`.
pub fn normalize_item_id(raw: &str) -> String {
    normalize("ITEM", raw)
}

/// `50001`, `inv-50001` and `INV-50001` all become `INV-50001`.
pub fn normalize_invoice_id(raw: &str) -> String {
    normalize("INV", raw)
}

fn normalize(prefix: &str, raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let number = match upper.strip_prefix(prefix).map(|rest| rest.trim_start_matches('-')) {
        Some(rest) => rest.split('-').next().unwrap_or(rest),
        None => upper.rsplit('-').next().unwrap_or(&upper),
    };
    format!("{prefix}-{:0>5}", number.trim())
}
