/// Buyers that carry their own defect severity rules
pub const BUYERS: [&str; 5] = ["Costco", "Aritzia", "Reitmans", "ANF", "MWW"];

/// Fallback buyer name when an MO number matches no rule
pub const OTHER_BUYER: &str = "Other";

// Checked in order: "COM" must win over the shorter "CO".
const MO_RULES: [(&str, &str); 6] = [
    ("COM", "MWW"),
    ("CO", "Costco"),
    ("AR", "Aritzia"),
    ("RT", "Reitmans"),
    ("AF", "ANF"),
    ("NT", "STORI"),
];

/// Work out the buyer from a manufacturing order number
///
/// # Examples
/// ```
/// use roving_qc::buyer::determine_buyer;
///
/// assert_eq!(determine_buyer("GPCOM2345"), "MWW");
/// assert_eq!(determine_buyer("GPCO1200"), "Costco");
/// assert_eq!(determine_buyer(""), "Other");
/// ```
pub fn determine_buyer(mo_no: &str) -> &'static str {
    if mo_no.is_empty() {
        return OTHER_BUYER;
    }
    MO_RULES
        .iter()
        .find(|(pattern, _)| mo_no.contains(pattern))
        .map(|(_, buyer)| *buyer)
        .unwrap_or(OTHER_BUYER)
}

/// Acceptable quality level used for a buyer's sampling plan
pub fn aql_level(buyer: &str) -> f64 {
    let upper = buyer.to_uppercase();
    if upper.contains("MWW") {
        2.5
    } else if upper.contains("REITMANS") {
        4.0
    } else if upper.contains("ARITZIA") {
        1.5
    } else if upper.contains("A & F") || upper.contains("A&F") || upper.contains("ANF") {
        1.5
    } else {
        1.0
    }
}
