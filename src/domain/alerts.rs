//! Wellness alert classification.
//!
//! Pure and cheap; callers compute it when displaying a log instead of
//! storing it next to the log.

use crate::model::{Mood, WellnessLog};

const MIN_SLEEP_HOURS: f64 = 6.0;
/// Sleep quality and energy at or below this are a concern
const LOW_SCORE: u8 = 2;
/// Soreness and stress at or above this are a concern
const HIGH_SCORE: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concern {
    ShortSleep,
    PoorSleepQuality,
    LowEnergy,
    HighSoreness,
    HighStress,
    LowMood,
}

impl Concern {
    pub fn describe(&self) -> &'static str {
        match self {
            Concern::ShortSleep => "less than 6 hours of sleep",
            Concern::PoorSleepQuality => "poor sleep quality",
            Concern::LowEnergy => "low energy",
            Concern::HighSoreness => "high soreness",
            Concern::HighStress => "high stress",
            Concern::LowMood => "low mood",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellnessAlert {
    pub severity: Severity,
    pub concerns: Vec<Concern>,
}

pub fn classify(log: &WellnessLog) -> WellnessAlert {
    let mut concerns = Vec::new();

    if log.sleep_hours.is_some_and(|hours| hours < MIN_SLEEP_HOURS) {
        concerns.push(Concern::ShortSleep);
    }
    if log.sleep_quality.is_some_and(|score| score <= LOW_SCORE) {
        concerns.push(Concern::PoorSleepQuality);
    }
    if log.energy_level.is_some_and(|score| score <= LOW_SCORE) {
        concerns.push(Concern::LowEnergy);
    }
    if log.soreness.is_some_and(|score| score >= HIGH_SCORE) {
        concerns.push(Concern::HighSoreness);
    }
    if log.stress.is_some_and(|score| score >= HIGH_SCORE) {
        concerns.push(Concern::HighStress);
    }
    if matches!(log.mood, Some(Mood::Poor) | Some(Mood::Terrible)) {
        concerns.push(Concern::LowMood);
    }

    let severity = match concerns.len() {
        0 => Severity::Low,
        1 | 2 => Severity::Medium,
        _ => Severity::High,
    };

    WellnessAlert { severity, concerns }
}
