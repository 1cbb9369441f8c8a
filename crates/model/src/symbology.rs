//! Venue instrument id conventions.
//!
//! Futures ids are an alphabetic product code followed by the contract month,
//! e.g. `rb1705`. Some exchanges quote the month with three digits (`SR705`),
//! which is normalized to four (`SR1705`) for the order book id.

/// Whether a venue instrument id looks like a plain futures contract.
///
/// Options (`m1707-C-2600`) and spreads (`SP a1709&a1801`) are rejected.
pub fn is_future(venue_id: &str) -> bool {
    let (prefix, digits) = split(venue_id);
    !prefix.is_empty()
        && (digits.len() == 3 || digits.len() == 4)
        && prefix.len() + digits.len() == venue_id.len()
        && digits.chars().all(|c| c.is_ascii_digit())
}

/// Order book id for a venue instrument id.
///
/// Returns `None` for ids shorter than four characters.
pub fn order_book_id(venue_id: &str) -> Option<String> {
    if venue_id.len() < 4 {
        return None;
    }
    let (prefix, digits) = split(venue_id);
    let normalized = if digits.len() == 3 {
        format!("{}1{}", prefix, digits)
    } else {
        venue_id.to_string()
    };
    Some(normalized.to_uppercase())
}

/// Product code of a venue instrument id, upper-cased (`rb1705` -> `RB`).
pub fn underlying_symbol(venue_id: &str) -> String {
    split(venue_id).0.to_uppercase()
}

fn split(venue_id: &str) -> (&str, &str) {
    let idx = venue_id
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(venue_id.len());
    venue_id.split_at(idx)
}
