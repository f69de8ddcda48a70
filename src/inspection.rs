//! Roving inspection rules
//!
//! A roving inspector samples garments from one operator, records defects per
//! garment and marks the SPI (stitches per inch) and measurement checks. This
//! module turns that raw tally into the garment verdicts and the overall
//! roving status shown on the live dashboard.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a defect is for the buyer of the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

/// Outcome of the SPI or measurement check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Pass,
    Reject,
    /// Something was entered but it is neither Pass nor Reject
    Unrecognized,
}

impl CheckResult {
    /// Parse a check value as the inspection form sends it
    ///
    /// Blank input means the check has not been done yet and yields `None`.
    pub fn parse(raw: &str) -> Option<CheckResult> {
        let value = raw.trim();
        if value.is_empty() {
            None
        } else if value.eq_ignore_ascii_case("pass") {
            Some(CheckResult::Pass)
        } else if value.eq_ignore_ascii_case("reject") {
            Some(CheckResult::Reject)
        } else {
            Some(CheckResult::Unrecognized)
        }
    }
}

/// Overall status of one operator inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RovingStatus {
    Pending,
    #[serde(rename = "Reject-Critical")]
    RejectCritical,
    #[serde(rename = "Reject-Major-M")]
    RejectMajorMultiple,
    #[serde(rename = "Reject-Minor-M")]
    RejectMinorMultiple,
    #[serde(rename = "Reject-Major-S")]
    RejectMajorSingle,
    #[serde(rename = "Reject-Minor-S")]
    RejectMinorSingle,
    Reject,
    Pass,
    Unknown,
}

/// Colour band a status is displayed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTier {
    Green,
    Yellow,
    Red,
    Gray,
}

impl RovingStatus {
    pub const ALL: [RovingStatus; 9] = [
        RovingStatus::Pass,
        RovingStatus::Reject,
        RovingStatus::RejectMajorSingle,
        RovingStatus::RejectMinorSingle,
        RovingStatus::RejectCritical,
        RovingStatus::RejectMajorMultiple,
        RovingStatus::RejectMinorMultiple,
        RovingStatus::Pending,
        RovingStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RovingStatus::Pending => "Pending",
            RovingStatus::RejectCritical => "Reject-Critical",
            RovingStatus::RejectMajorMultiple => "Reject-Major-M",
            RovingStatus::RejectMinorMultiple => "Reject-Minor-M",
            RovingStatus::RejectMajorSingle => "Reject-Major-S",
            RovingStatus::RejectMinorSingle => "Reject-Minor-S",
            RovingStatus::Reject => "Reject",
            RovingStatus::Pass => "Pass",
            RovingStatus::Unknown => "Unknown",
        }
    }

    pub fn tier(&self) -> StatusTier {
        match self {
            RovingStatus::RejectCritical
            | RovingStatus::RejectMajorMultiple
            | RovingStatus::RejectMinorMultiple => StatusTier::Red,
            RovingStatus::Reject
            | RovingStatus::RejectMajorSingle
            | RovingStatus::RejectMinorSingle => StatusTier::Yellow,
            RovingStatus::Pass => StatusTier::Green,
            RovingStatus::Pending | RovingStatus::Unknown => StatusTier::Gray,
        }
    }

    pub fn is_reject(&self) -> bool {
        matches!(self.tier(), StatusTier::Red | StatusTier::Yellow)
    }
}

impl fmt::Display for RovingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Defect quantities per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityTally {
    pub critical: u32,
    pub major: u32,
    pub minor: u32,
}

impl SeverityTally {
    pub fn add(&mut self, severity: Severity, qty: u32) {
        match severity {
            Severity::Critical => self.critical = self.critical.saturating_add(qty),
            Severity::Major => self.major = self.major.saturating_add(qty),
            Severity::Minor => self.minor = self.minor.saturating_add(qty),
        }
    }

    pub fn total(&self) -> u32 {
        self.critical
            .saturating_add(self.major)
            .saturating_add(self.minor)
    }
}

/// Derive the overall roving status
///
/// Rules are checked top to bottom and the first match wins:
/// a missing SPI or measurement check keeps the inspection pending, any
/// critical defect rejects it outright, then repeated and single major or
/// minor defects, then a rejected SPI/measurement check. Only a clean
/// inspection with both checks passed is a pass.
///
/// # Examples
/// ```
/// use roving_qc::inspection::{classify, CheckResult, RovingStatus, SeverityTally};
///
/// let tally = SeverityTally { critical: 0, major: 1, minor: 3 };
/// let status = classify(Some(CheckResult::Pass), Some(CheckResult::Pass), &tally);
/// assert_eq!(status, RovingStatus::RejectMinorMultiple);
/// ```
pub fn classify(
    spi: Option<CheckResult>,
    measurement: Option<CheckResult>,
    tally: &SeverityTally,
) -> RovingStatus {
    let (spi, measurement) = match (spi, measurement) {
        (Some(spi), Some(measurement)) => (spi, measurement),
        _ => return RovingStatus::Pending,
    };

    if tally.critical > 0 {
        RovingStatus::RejectCritical
    } else if tally.major >= 2 {
        RovingStatus::RejectMajorMultiple
    } else if tally.minor >= 2 {
        RovingStatus::RejectMinorMultiple
    } else if tally.major == 1 {
        RovingStatus::RejectMajorSingle
    } else if tally.minor == 1 {
        RovingStatus::RejectMinorSingle
    } else if spi == CheckResult::Reject || measurement == CheckResult::Reject {
        RovingStatus::Reject
    } else if spi == CheckResult::Pass && measurement == CheckResult::Pass {
        // major and minor are both zero here
        RovingStatus::Pass
    } else {
        RovingStatus::Unknown
    }
}

/// Sampling depth chosen on the roving form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InspectionType {
    #[default]
    Normal,
    Critical,
}

impl InspectionType {
    /// Number of garments checked per operator
    pub fn sample_size(&self) -> usize {
        match self {
            InspectionType::Normal => 5,
            InspectionType::Critical => 15,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GarmentStatus {
    #[default]
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityStatus {
    #[default]
    Pass,
    Reject,
}

/// One defect found on a garment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarmentDefect {
    pub name: String,
    pub count: u32,
    #[serde(rename = "operationId", default)]
    pub operation_id: String,
    #[serde(default)]
    pub repair: String,
}

/// A sampled garment and the defects recorded against it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Garment {
    #[serde(default)]
    pub garment_defect_id: String,
    #[serde(default)]
    pub defects: Vec<GarmentDefect>,
    #[serde(default)]
    pub status: GarmentStatus,
    #[serde(default)]
    pub garment_defect_count: u32,
}

impl Garment {
    pub fn is_fail(&self) -> bool {
        !self.defects.is_empty()
    }

    pub fn defect_count(&self) -> u32 {
        self.defects
            .iter()
            .fold(0u32, |n, d| n.saturating_add(d.count))
    }

    /// Drop empty defect lines and recompute the derived fields
    pub fn normalize(&mut self) {
        self.defects.retain(|d| d.count > 0 && !d.name.trim().is_empty());
        self.garment_defect_count = self.defect_count();
        self.status = if self.is_fail() {
            GarmentStatus::Fail
        } else {
            GarmentStatus::Pass
        };
    }
}

/// Sum defect quantities per severity over a set of garments
pub fn tally<F>(garments: &[Garment], severity_of: F) -> SeverityTally
where
    F: Fn(&str) -> Severity,
{
    let mut tally = SeverityTally::default();
    for defect in garments.iter().flat_map(|g| g.defects.iter()) {
        tally.add(severity_of(&defect.name), defect.count);
    }
    tally
}

/// Quality status of the sample: one failed garment rejects it
pub fn quality_status(garments: &[Garment]) -> QualityStatus {
    if garments.iter().any(Garment::is_fail) {
        QualityStatus::Reject
    } else {
        QualityStatus::Pass
    }
}

const CRITICAL_WORDS: [&str; 3] = ["critical", "safety", "hole"];
const MAJOR_WORDS: [&str; 6] = ["major", "broken", "open", "mismatched", "skip", "unravel"];

/// Severity guessed from the defect name alone
///
/// Used for defects that are not in the catalog. Anything that does not
/// look critical or major counts as minor.
pub fn keyword_severity(name: &str) -> Severity {
    let lower = name.to_lowercase();
    if CRITICAL_WORDS.iter().any(|w| lower.contains(w)) {
        Severity::Critical
    } else if MAJOR_WORDS.iter().any(|w| lower.contains(w)) {
        Severity::Major
    } else {
        Severity::Minor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn garment(defects: &[(&str, u32)]) -> Garment {
        let mut g = Garment {
            defects: defects
                .iter()
                .map(|(name, count)| GarmentDefect {
                    name: name.to_string(),
                    count: *count,
                    operation_id: String::new(),
                    repair: String::new(),
                })
                .collect(),
            ..Garment::default()
        };
        g.normalize();
        g
    }

    #[test]
    fn normalize_drops_zero_counts() {
        let g = garment(&[("Broken stitch", 0), ("Dirty mark", 2)]);
        assert_eq!(g.defects.len(), 1);
        assert_eq!(g.garment_defect_count, 2);
        assert_eq!(g.status, GarmentStatus::Fail);

        let clean = garment(&[("Broken stitch", 0)]);
        assert_eq!(clean.status, GarmentStatus::Pass);
    }

    #[test]
    fn tally_uses_quantities() {
        let garments = vec![garment(&[("Skip stitch", 2)]), garment(&[("Stain", 1)])];
        let t = tally(&garments, keyword_severity);
        assert_eq!(t, SeverityTally { critical: 0, major: 2, minor: 1 });
        assert_eq!(quality_status(&garments), QualityStatus::Reject);
    }

    #[test]
    fn status_wire_names() {
        let json = serde_json::to_string(&RovingStatus::RejectMajorSingle).unwrap();
        assert_eq!(json, "\"Reject-Major-S\"");
        for status in RovingStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
