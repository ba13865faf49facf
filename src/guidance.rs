//! Prevention tips keyed by risk band.

use crate::result_assembler::RiskBand;

pub const LOW_TIPS: &[&str] = &[
    "Keep up with regular health checkups.",
    "Maintain a balanced diet and exercise.",
    "Avoid smoking and manage stress effectively.",
];

pub const MODERATE_TIPS: &[&str] = &[
    "Monitor and manage blood pressure and glucose levels.",
    "Limit alcohol intake and avoid smoking.",
    "Consider lifestyle modifications like increasing physical activity.",
];

pub const HIGH_TIPS: &[&str] = &[
    "Seek medical advice for detailed cardiovascular assessment.",
    "Take prescribed medications if necessary (e.g., antihypertensives).",
    "Adopt a strict healthy diet and consistent physical activity routine.",
    "Completely avoid tobacco products and excessive alcohol.",
];

pub const GENERAL_TIPS: &[&str] = &[
    "Discuss these results with your healthcare provider.",
    "Develop a personalised prevention plan.",
    "Schedule regular monitoring of risk factors.",
];

pub fn summary_for(band: RiskBand) -> &'static str {
    match band {
        RiskBand::Low => "You have a low risk. Keep up the good work!",
        RiskBand::Moderate => "You are at moderate risk. Take proactive steps to lower it.",
        RiskBand::High => "You are at high risk. Please take immediate action.",
    }
}

pub fn tips_for(band: RiskBand) -> &'static [&'static str] {
    match band {
        RiskBand::Low => LOW_TIPS,
        RiskBand::Moderate => MODERATE_TIPS,
        RiskBand::High => HIGH_TIPS,
    }
}
