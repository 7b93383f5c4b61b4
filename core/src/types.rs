//! Shared primitive types used across the entire simulation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A simulated day. Day 1 is the first tick; day 0 is "before launch".
pub type Day = u64;

/// Stable identity of a user. Equals the user's index in the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u32);

/// Stable identity of an escort. Lower ids were recruited earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EscortId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u-{:06}", self.0)
    }
}

impl fmt::Display for EscortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e-{:04}", self.0)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "o-{:08}", self.0)
    }
}

/// The three senior age bands the platform serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeTier {
    #[serde(rename = "60_69")]
    Sixties,
    #[serde(rename = "70_79")]
    Seventies,
    #[serde(rename = "80_plus")]
    EightyPlus,
}

impl AgeTier {
    pub const ALL: [AgeTier; 3] = [AgeTier::Sixties, AgeTier::Seventies, AgeTier::EightyPlus];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sixties    => "60-69",
            Self::Seventies  => "70-79",
            Self::EightyPlus => "80+",
        }
    }
}

/// How a user was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    OnlineAd,
    Referral,
    HospitalPartnership,
    StreetTeam,
}

impl Channel {
    /// Channels the platform pays for, in channel-mix order.
    pub const PAID: [Channel; 3] = [Channel::OnlineAd, Channel::HospitalPartnership, Channel::StreetTeam];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnlineAd            => "online_ad",
            Self::Referral            => "referral",
            Self::HospitalPartnership => "hospital_partnership",
            Self::StreetTeam          => "street_team",
        }
    }
}

/// Per-channel accumulator (user counts, acquisition spend).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelTally<T> {
    pub online_ad:            T,
    pub referral:             T,
    pub hospital_partnership: T,
    pub street_team:          T,
}

impl<T: Copy + std::ops::AddAssign> ChannelTally<T> {
    pub fn add(&mut self, channel: Channel, amount: T) {
        match channel {
            Channel::OnlineAd            => self.online_ad += amount,
            Channel::Referral            => self.referral += amount,
            Channel::HospitalPartnership => self.hospital_partnership += amount,
            Channel::StreetTeam          => self.street_team += amount,
        }
    }

    pub fn get(&self, channel: Channel) -> T {
        match channel {
            Channel::OnlineAd            => self.online_ad,
            Channel::Referral            => self.referral,
            Channel::HospitalPartnership => self.hospital_partnership,
            Channel::StreetTeam          => self.street_team,
        }
    }
}

/// A half-open interval of minutes after midnight: [start, end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_minute: u16,
    pub end_minute:   u16,
}

impl TimeWindow {
    pub fn new(start_minute: u16, end_minute: u16) -> Self {
        Self { start_minute, end_minute }
    }

    /// Back-to-back windows (one ends when the next starts) do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start_minute < other.end_minute && other.start_minute < self.end_minute
    }
}

/// Appointment slots of the hospital day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSlot {
    Peak,      // 08:00-11:00
    Midday,    // 11:00-13:00
    Afternoon, // 13:00-16:00
    Evening,   // 16:00-18:00
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 4] = [TimeSlot::Peak, TimeSlot::Midday, TimeSlot::Afternoon, TimeSlot::Evening];

    pub fn window(&self) -> TimeWindow {
        match self {
            Self::Peak      => TimeWindow::new(8 * 60, 11 * 60),
            Self::Midday    => TimeWindow::new(11 * 60, 13 * 60),
            Self::Afternoon => TimeWindow::new(13 * 60, 16 * 60),
            Self::Evening   => TimeWindow::new(16 * 60, 18 * 60),
        }
    }
}

/// What a complaint is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintType {
    /// The escort relayed wrong medical guidance.
    MedicalAdvice,
    /// Friction with hospital staff or rules.
    HospitalConflict,
    ServiceQuality,
    Other,
}

impl ComplaintType {
    pub const ALL: [ComplaintType; 4] = [
        ComplaintType::MedicalAdvice,
        ComplaintType::HospitalConflict,
        ComplaintType::ServiceQuality,
        ComplaintType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MedicalAdvice    => "medical_advice",
            Self::HospitalConflict => "hospital_conflict",
            Self::ServiceQuality   => "service_quality",
            Self::Other            => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    Critical,
}

/// Per-complaint-type counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintTally {
    pub medical_advice:    u32,
    pub hospital_conflict: u32,
    pub service_quality:   u32,
    pub other:             u32,
}

impl ComplaintTally {
    pub fn add(&mut self, kind: ComplaintType) {
        match kind {
            ComplaintType::MedicalAdvice    => self.medical_advice += 1,
            ComplaintType::HospitalConflict => self.hospital_conflict += 1,
            ComplaintType::ServiceQuality   => self.service_quality += 1,
            ComplaintType::Other            => self.other += 1,
        }
    }

    pub fn get(&self, kind: ComplaintType) -> u32 {
        match kind {
            ComplaintType::MedicalAdvice    => self.medical_advice,
            ComplaintType::HospitalConflict => self.hospital_conflict,
            ComplaintType::ServiceQuality   => self.service_quality,
            ComplaintType::Other            => self.other,
        }
    }

    pub fn total(&self) -> u32 {
        self.medical_advice + self.hospital_conflict + self.service_quality + self.other
    }
}
