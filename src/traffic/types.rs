use crate::error::AppError;
use serde::Serialize;
use std::str::FromStr;
use std::time::Duration;

pub const HIGH_CHANGE_THRESHOLD_PCT: f64 = 10.0;
pub const MEDIUM_CHANGE_THRESHOLD_PCT: f64 = 5.0;

pub const LOW_PROFILE: TrafficProfile = TrafficProfile {
    busy_iterations: 200,
    busy_range: 1_000,
    idle_interval: Duration::from_millis(1_000),
};
pub const MEDIUM_PROFILE: TrafficProfile = TrafficProfile {
    busy_iterations: 1_000,
    busy_range: 5_000,
    idle_interval: Duration::from_millis(200),
};
pub const HIGH_PROFILE: TrafficProfile = TrafficProfile {
    busy_iterations: 4_000,
    busy_range: 10_000,
    idle_interval: Duration::from_millis(100),
};
pub const BASELINE_PROFILE: TrafficProfile = TrafficProfile {
    busy_iterations: 50,
    busy_range: 500,
    idle_interval: Duration::from_millis(2_000),
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLevel {
    Off,
    Low,
    Medium,
    High,
}

impl TrafficLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn ordinal(self) -> i64 {
        match self {
            Self::Off => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Level an observed price move asks for, if any.
    pub fn for_price_change(change_percent: f64) -> Option<Self> {
        let magnitude = change_percent.abs();
        if magnitude >= HIGH_CHANGE_THRESHOLD_PCT {
            Some(Self::High)
        } else if magnitude >= MEDIUM_CHANGE_THRESHOLD_PCT {
            Some(Self::Medium)
        } else {
            None
        }
    }
}

impl FromStr for TrafficLevel {
    type Err = AppError;

    /// Accepts the canonical names plus the legacy `normal`/`none`/`minimal` spellings.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "off" | "normal" | "none" => Ok(Self::Off),
            "low" | "minimal" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(AppError::InvalidLevel(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficProfile {
    pub busy_iterations: u32,
    pub busy_range: u64,
    pub idle_interval: Duration,
}

/// Profiles a controller runs with. Fixed for the lifetime of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficProfiles {
    pub low: TrafficProfile,
    pub medium: TrafficProfile,
    pub high: TrafficProfile,
    pub baseline: TrafficProfile,
}

impl Default for TrafficProfiles {
    fn default() -> Self {
        Self {
            low: LOW_PROFILE,
            medium: MEDIUM_PROFILE,
            high: HIGH_PROFILE,
            baseline: BASELINE_PROFILE,
        }
    }
}

impl TrafficProfiles {
    pub fn for_level(&self, level: TrafficLevel) -> Option<TrafficProfile> {
        match level {
            TrafficLevel::Off => None,
            TrafficLevel::Low => Some(self.low),
            TrafficLevel::Medium => Some(self.medium),
            TrafficLevel::High => Some(self.high),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyKind {
    SystemError,
    MassiveTrading,
    EmergencyNews,
}

impl EmergencyKind {
    pub const ALL: [EmergencyKind; 3] = [
        EmergencyKind::SystemError,
        EmergencyKind::MassiveTrading,
        EmergencyKind::EmergencyNews,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SystemError => "system_error",
            Self::MassiveTrading => "massive_trading",
            Self::EmergencyNews => "emergency_news",
        }
    }

    pub fn level(self) -> TrafficLevel {
        match self {
            Self::SystemError => TrafficLevel::Low,
            Self::MassiveTrading => TrafficLevel::High,
            Self::EmergencyNews => TrafficLevel::Medium,
        }
    }
}

impl FromStr for EmergencyKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| AppError::UnknownEmergency(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SimulationState {
    pub active: bool,
    pub level: TrafficLevel,
    pub emergency: bool,
    pub auto_mode: bool,
}

impl SimulationState {
    pub fn idle(auto_mode: bool) -> Self {
        Self {
            active: false,
            level: TrafficLevel::Off,
            emergency: false,
            auto_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerCounts {
    pub foreground: usize,
    pub baseline: usize,
}
