use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WoundType {
    #[serde(rename = "DFU")]
    DiabeticFootUlcer,
    #[serde(rename = "VLU")]
    VenousLegUlcer,
    #[serde(rename = "PU")]
    PressureUlcer,
    #[serde(rename = "AU")]
    ArterialUlcer,
    #[serde(rename = "SW")]
    SurgicalWound,
    #[serde(rename = "TW")]
    TraumaticWound,
    #[serde(rename = "MIXED")]
    MixedEtiology,
    #[serde(rename = "OTHER")]
    Other,
}

impl WoundType {
    pub const ALL: [WoundType; 8] = [
        WoundType::DiabeticFootUlcer,
        WoundType::VenousLegUlcer,
        WoundType::PressureUlcer,
        WoundType::ArterialUlcer,
        WoundType::SurgicalWound,
        WoundType::TraumaticWound,
        WoundType::MixedEtiology,
        WoundType::Other,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            WoundType::DiabeticFootUlcer => "DFU",
            WoundType::VenousLegUlcer => "VLU",
            WoundType::PressureUlcer => "PU",
            WoundType::ArterialUlcer => "AU",
            WoundType::SurgicalWound => "SW",
            WoundType::TraumaticWound => "TW",
            WoundType::MixedEtiology => "MIXED",
            WoundType::Other => "OTHER",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WoundType::DiabeticFootUlcer => "Diabetic Foot Ulcer",
            WoundType::VenousLegUlcer => "Venous Leg Ulcer",
            WoundType::PressureUlcer => "Pressure Ulcer/Injury",
            WoundType::ArterialUlcer => "Arterial Ulcer",
            WoundType::SurgicalWound => "Surgical Wound",
            WoundType::TraumaticWound => "Traumatic Wound",
            WoundType::MixedEtiology => "Mixed Etiology",
            WoundType::Other => "Other",
        }
    }

    /// X12 service type codes sent with eligibility inquiries.
    pub fn service_type_codes(&self) -> &'static [&'static str] {
        match self {
            WoundType::TraumaticWound => &["1"],
            _ => &["30"],
        }
    }

    /// Maps codes, snake_case keys, display names and "Name (CODE)" labels
    /// onto a wound type. Unrecognized input maps to `Other`.
    pub fn normalize(input: &str) -> WoundType {
        let trimmed = input.trim();

        // "Diabetic Foot Ulcer (DFU)" 形式先取括號內代碼
        if let (Some(open), Some(close)) = (trimmed.rfind('('), trimmed.rfind(')')) {
            if open < close {
                if let Some(wt) = Self::from_key(&trimmed[open + 1..close]) {
                    return wt;
                }
            }
        }

        Self::from_key(trimmed).unwrap_or(WoundType::Other)
    }

    fn from_key(raw: &str) -> Option<WoundType> {
        let key: String = raw
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let wt = match key.as_str() {
            "dfu" | "diabetic foot ulcer" | "diabetic ulcer" | "diabetic foot" | "diabetic" => {
                WoundType::DiabeticFootUlcer
            }
            "vlu" | "venous leg ulcer" | "venous ulcer" | "venous stasis ulcer" | "venous" => {
                WoundType::VenousLegUlcer
            }
            "pu" | "pi" | "pressure ulcer" | "pressure injury" | "pressure ulcer injury"
            | "decubitus ulcer" | "pressure" => WoundType::PressureUlcer,
            "au" | "arterial ulcer" | "arterial" => WoundType::ArterialUlcer,
            "sw" | "surgical wound" | "surgical" | "post surgical wound" => {
                WoundType::SurgicalWound
            }
            "tw" | "traumatic wound" | "trauma" | "traumatic" => WoundType::TraumaticWound,
            "mixed" | "mixed etiology" | "mixed ulcer" => WoundType::MixedEtiology,
            "other" => WoundType::Other,
            _ => return None,
        };
        Some(wt)
    }
}

impl fmt::Display for WoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Canonical code for free-form wound-type input.
pub fn normalize_wound_type(input: &str) -> &'static str {
    WoundType::normalize(input).code()
}
