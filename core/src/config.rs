use crate::{
    error::{SimError, SimResult},
    types::{AgeTier, Channel, ComplaintType, Day, Severity, TimeSlot},
};
use serde::{Deserialize, Serialize};

// ── Demand ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandConfig {
    /// Daily active users of the apps the platform advertises in.
    pub dau_base:              f64,
    pub exposure_rate:         f64,
    pub click_rate:            f64,
    pub consult_rate:          f64,
    pub order_conversion_rate: f64,
    pub demand_volatility:     f64,
    pub weekend_factor:        f64,
    pub month_end_factor:      f64,
    pub price_mean:            f64,
    pub price_std:             f64,
    pub price_floor:           f64,
    pub cancellation_rate:     f64,
    pub first_order_repeat_rate: f64,
    pub proxy_repeat_rate:     f64,
    pub self_repeat_rate:      f64,
    pub min_repeat_gap_days:   u32,
    pub urban_share:           f64,
    pub channel_mix:           ChannelMix,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            dau_base:              2_000_000.0,
            exposure_rate:         0.03,
            click_rate:            0.02,
            consult_rate:          0.35,
            order_conversion_rate: 0.65,
            demand_volatility:     0.15,
            weekend_factor:        0.8,
            month_end_factor:      1.15,
            price_mean:            235.0,
            price_std:             50.0,
            price_floor:           50.0,
            cancellation_rate:     0.02,
            first_order_repeat_rate: 0.135,
            proxy_repeat_rate:     0.45,
            self_repeat_rate:      0.225,
            min_repeat_gap_days:   7,
            urban_share:           0.70,
            channel_mix:           ChannelMix::default(),
        }
    }
}

/// Relative weights of the paid acquisition channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMix {
    pub online_ad:            f64,
    pub hospital_partnership: f64,
    pub street_team:          f64,
}

impl Default for ChannelMix {
    fn default() -> Self {
        Self { online_ad: 0.60, hospital_partnership: 0.25, street_team: 0.15 }
    }
}

impl ChannelMix {
    /// Weights aligned with `Channel::PAID`.
    pub fn weights(&self) -> [f64; 3] {
        [self.online_ad, self.hospital_partnership, self.street_team]
    }
}

// ── Age tiers ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeTierParams {
    pub population_share:      f64,
    /// Share of orders placed by family members on the senior's behalf.
    pub proxy_usage_rate:      f64,
    pub order_propensity:      f64,
    pub repurchase_cycle_days: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgeTierConfig {
    #[serde(rename = "60_69")]
    pub sixties:     AgeTierParams,
    #[serde(rename = "70_79")]
    pub seventies:   AgeTierParams,
    #[serde(rename = "80_plus")]
    pub eighty_plus: AgeTierParams,
}

impl Default for AgeTierConfig {
    fn default() -> Self {
        Self {
            sixties: AgeTierParams {
                population_share: 0.40, proxy_usage_rate: 0.40,
                order_propensity: 1.00, repurchase_cycle_days: 60.0,
            },
            seventies: AgeTierParams {
                population_share: 0.40, proxy_usage_rate: 0.70,
                order_propensity: 0.85, repurchase_cycle_days: 45.0,
            },
            eighty_plus: AgeTierParams {
                population_share: 0.20, proxy_usage_rate: 0.90,
                order_propensity: 0.60, repurchase_cycle_days: 30.0,
            },
        }
    }
}

impl AgeTierConfig {
    pub fn get(&self, tier: AgeTier) -> &AgeTierParams {
        match tier {
            AgeTier::Sixties    => &self.sixties,
            AgeTier::Seventies  => &self.seventies,
            AgeTier::EightyPlus => &self.eighty_plus,
        }
    }

    /// Population shares aligned with `AgeTier::ALL`.
    pub fn shares(&self) -> [f64; 3] {
        AgeTier::ALL.map(|t| self.get(t).population_share)
    }
}

// ── Time of day ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeOfDayMultipliers {
    pub peak:      f64,
    pub midday:    f64,
    pub afternoon: f64,
    pub evening:   f64,
}

impl Default for TimeOfDayMultipliers {
    fn default() -> Self {
        Self { peak: 1.4, midday: 1.0, afternoon: 0.9, evening: 0.7 }
    }
}

impl TimeOfDayMultipliers {
    /// Multipliers aligned with `TimeSlot::ALL`.
    pub fn weights(&self) -> [f64; 4] {
        TimeSlot::ALL.map(|s| self.get(s))
    }

    pub fn get(&self, slot: TimeSlot) -> f64 {
        match slot {
            TimeSlot::Peak      => self.peak,
            TimeSlot::Midday    => self.midday,
            TimeSlot::Afternoon => self.afternoon,
            TimeSlot::Evening   => self.evening,
        }
    }

    /// Average multiplier across slots; scales total daily demand.
    pub fn mean(&self) -> f64 {
        self.weights().iter().sum::<f64>() / 4.0
    }
}

// ── Acquisition cost ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacTable {
    pub online_ad:            f64,
    pub referral:             f64,
    pub hospital_partnership: f64,
    pub street_team:          f64,
}

impl Default for CacTable {
    fn default() -> Self {
        Self { online_ad: 80.0, referral: 0.0, hospital_partnership: 150.0, street_team: 60.0 }
    }
}

impl CacTable {
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::OnlineAd            => self.online_ad,
            Channel::Referral            => self.referral,
            Channel::HospitalPartnership => self.hospital_partnership,
            Channel::StreetTeam          => self.street_team,
        }
    }
}

// ── Matching and service ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Repeat probability of a user who has a designated escort.
    pub designated_repeat_rate:       f64,
    pub commute_ceiling_minutes:      f64,
    pub average_speed_kmh:            f64,
    pub history_depth:                usize,
    pub designation_rating_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            designated_repeat_rate:       0.82,
            commute_ceiling_minutes:      90.0,
            average_speed_kmh:            25.0,
            history_depth:                5,
            designation_rating_threshold: 4.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub success_rate:             f64,
    pub rating_mean:              f64,
    pub rating_std:               f64,
    pub complaint_on_failure:     f64,
    pub complaint_on_unmatched:   f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            success_rate:           0.95,
            rating_mean:            4.5,
            rating_std:             0.3,
            complaint_on_failure:   0.30,
            complaint_on_unmatched: 0.30,
        }
    }
}

// ── Feedback loops ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplaintConfig {
    pub window_days: usize,
    /// Conversion points lost per point of complaint rate.
    pub conversion_coefficient: f64,
    /// Share of complaints closed once their resolution time has passed;
    /// the rest are escalated.
    pub resolution_rate: f64,
    pub types: ComplaintTypeTable,
}

impl Default for ComplaintConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            conversion_coefficient: 0.45,
            resolution_rate: 0.95,
            types: ComplaintTypeTable::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintTypeParams {
    /// Relative frequency among complaints.
    pub share:              f64,
    pub severity:           Severity,
    pub resolution_hours:   f64,
    /// Fraction of the order price refunded to the user.
    pub compensation_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplaintTypeTable {
    pub medical_advice:    ComplaintTypeParams,
    pub hospital_conflict: ComplaintTypeParams,
    pub service_quality:   ComplaintTypeParams,
    pub other:             ComplaintTypeParams,
}

impl Default for ComplaintTypeTable {
    fn default() -> Self {
        Self {
            medical_advice: ComplaintTypeParams {
                share: 0.075, severity: Severity::Critical,
                resolution_hours: 168.0, compensation_ratio: 1.0,
            },
            hospital_conflict: ComplaintTypeParams {
                share: 0.125, severity: Severity::Medium,
                resolution_hours: 24.0, compensation_ratio: 0.5,
            },
            service_quality: ComplaintTypeParams {
                share: 0.65, severity: Severity::Medium,
                resolution_hours: 48.0, compensation_ratio: 0.3,
            },
            other: ComplaintTypeParams {
                share: 0.15, severity: Severity::Low,
                resolution_hours: 72.0, compensation_ratio: 0.1,
            },
        }
    }
}

impl ComplaintTypeTable {
    pub fn get(&self, kind: ComplaintType) -> &ComplaintTypeParams {
        match kind {
            ComplaintType::MedicalAdvice    => &self.medical_advice,
            ComplaintType::HospitalConflict => &self.hospital_conflict,
            ComplaintType::ServiceQuality   => &self.service_quality,
            ComplaintType::Other            => &self.other,
        }
    }

    /// Shares aligned with `ComplaintType::ALL`.
    pub fn shares(&self) -> [f64; 4] {
        ComplaintType::ALL.map(|t| self.get(t).share)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferralConfig {
    pub conversion_rate:    f64,
    pub social_reach:       u32,
    pub promoter_threshold: f64,
    pub passive_threshold:  f64,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self { conversion_rate: 0.075, social_reach: 3, promoter_threshold: 9.0, passive_threshold: 7.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub at_risk_after_days:  u32,
    pub silent_after_days:   u32,
    pub churned_after_days:  u32,
    pub weekly_reactivation: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { at_risk_after_days: 30, silent_after_days: 60, churned_after_days: 90, weekly_reactivation: 0.05 }
    }
}

// ── Supply and competition ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyConfig {
    pub initial_escorts:            u32,
    pub initial_certified_share:    f64,
    pub week1_recruitment:          f64,
    /// Fraction of the week-1 rate reached at the horizon.
    pub recruitment_floor:          f64,
    pub recruitment_horizon_weeks:  u64,
    pub basic_training_days:        Day,
    pub professional_training_days: Day,
    pub training_pass_rate:         f64,
    pub basic_daily_capacity:       usize,
    pub certified_daily_capacity:   usize,
    pub monthly_attrition:          f64,
    pub urban_share:                f64,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            initial_escorts:            120,
            initial_certified_share:    0.3,
            week1_recruitment:          20.0,
            recruitment_floor:          0.4,
            recruitment_horizon_weeks:  52,
            basic_training_days:        7,
            professional_training_days: 21,
            training_pass_rate:         0.70,
            basic_daily_capacity:       2,
            certified_daily_capacity:   3,
            monthly_attrition:          0.08,
            urban_share:                0.80,
        }
    }
}

/// A competitor campaign that raises escort attrition for a while.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoachingEvent {
    pub start_day: Day,
    pub end_day:   Day,
    pub extra_monthly_attrition: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitionConfig {
    pub poaching_events: Vec<PoachingEvent>,
}

impl CompetitionConfig {
    /// Extra monthly attrition from every campaign active on `day`.
    pub fn extra_attrition(&self, day: Day) -> f64 {
        self.poaching_events
            .iter()
            .filter(|e| e.start_day <= day && day <= e.end_day)
            .map(|e| e.extra_monthly_attrition)
            .sum()
    }
}

/// An outside shock (a hospital ban, a licensing rule, a privacy scandal,
/// an insurance subsidy) that shifts demand and escort recruitment while
/// it lasts. Impacts are additive across concurrent events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRiskEvent {
    pub name:              String,
    /// Chance per day that the event starts while it is not already running.
    #[serde(default)]
    pub daily_probability: f64,
    /// Start on this day regardless of the draw.
    #[serde(default)]
    pub scheduled_day:     Option<Day>,
    /// e.g. -0.5 halves demand, +0.8 lifts it by 80%.
    #[serde(default)]
    pub demand_impact:     f64,
    /// Applied to the weekly recruitment rate the same way.
    #[serde(default)]
    pub supply_impact:     f64,
    pub duration_days:     Day,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub events: Vec<PolicyRiskEvent>,
}

// ── Root ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub total_days:    i64,
    pub num_trials:    i64,
    pub random_seed:   u64,
    /// Fraction of the addressable market simulated individually.
    pub market_scale:  f64,
    pub initial_users: u32,
    pub demand:        DemandConfig,
    pub age_tiers:     AgeTierConfig,
    pub time_of_day:   TimeOfDayMultipliers,
    pub cac:           CacTable,
    pub matching:      MatchingConfig,
    pub service:       ServiceConfig,
    pub complaint:     ComplaintConfig,
    pub referral:      ReferralConfig,
    pub lifecycle:     LifecycleConfig,
    pub supply:        SupplyConfig,
    pub competition:   CompetitionConfig,
    pub policy:        PolicyConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            total_days:    90,
            num_trials:    1,
            random_seed:   42,
            market_scale:  1.0,
            initial_users: 600,
            demand:        DemandConfig::default(),
            age_tiers:     AgeTierConfig::default(),
            time_of_day:   TimeOfDayMultipliers::default(),
            cac:           CacTable::default(),
            matching:      MatchingConfig::default(),
            service:       ServiceConfig::default(),
            complaint:     ComplaintConfig::default(),
            referral:      ReferralConfig::default(),
            lifecycle:     LifecycleConfig::default(),
            supply:        SupplyConfig::default(),
            competition:   CompetitionConfig::default(),
            policy:        PolicyConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load a scenario file. Sections and fields the file omits keep
    /// their baseline values.
    /// In tests, use SimConfig::default_test().
    pub fn load(path: &str) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SimConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// A small market for fast tests: 10% scale, 30 days.
    pub fn default_test() -> Self {
        let mut config = Self { total_days: 30, market_scale: 0.1, initial_users: 80, ..Self::default() };
        config.supply.initial_escorts = 15;
        config.supply.week1_recruitment = 2.0;
        config
    }

    /// Days to simulate. Only meaningful after `validate()`.
    pub fn days(&self) -> Day {
        self.total_days.max(0) as Day
    }

    pub fn trials(&self) -> u32 {
        self.num_trials.clamp(0, u32::MAX as i64) as u32
    }

    /// Reject out-of-range parameters before the first tick.
    pub fn validate(&self) -> SimResult<()> {
        ensure(self.total_days > 0, "total_days", format!("must be positive, got {}", self.total_days))?;
        ensure(self.num_trials > 0, "num_trials", format!("must be positive, got {}", self.num_trials))?;
        ensure(self.market_scale > 0.0, "market_scale", "must be positive")?;

        let d = &self.demand;
        ensure(d.dau_base >= 0.0, "demand.dau_base", "must be non-negative")?;
        probability("demand.exposure_rate", d.exposure_rate)?;
        probability("demand.click_rate", d.click_rate)?;
        probability("demand.consult_rate", d.consult_rate)?;
        probability("demand.order_conversion_rate", d.order_conversion_rate)?;
        probability("demand.cancellation_rate", d.cancellation_rate)?;
        probability("demand.first_order_repeat_rate", d.first_order_repeat_rate)?;
        probability("demand.proxy_repeat_rate", d.proxy_repeat_rate)?;
        probability("demand.self_repeat_rate", d.self_repeat_rate)?;
        probability("demand.urban_share", d.urban_share)?;
        ensure(d.demand_volatility >= 0.0, "demand.demand_volatility", "must be non-negative")?;
        ensure(d.weekend_factor >= 0.0, "demand.weekend_factor", "must be non-negative")?;
        ensure(d.month_end_factor >= 0.0, "demand.month_end_factor", "must be non-negative")?;
        ensure(d.price_mean > 0.0, "demand.price_mean", "must be positive")?;
        ensure(d.price_std >= 0.0, "demand.price_std", "must be non-negative")?;
        weights("demand.channel_mix", &d.channel_mix.weights())?;

        for tier in AgeTier::ALL {
            let p = self.age_tiers.get(tier);
            let label = tier.label();
            probability(&format!("age_tiers.{label}.proxy_usage_rate"), p.proxy_usage_rate)?;
            probability(&format!("age_tiers.{label}.order_propensity"), p.order_propensity)?;
            ensure(
                p.repurchase_cycle_days > 0.0,
                format!("age_tiers.{label}.repurchase_cycle_days"),
                "must be positive",
            )?;
        }
        weights("age_tiers.population_share", &self.age_tiers.shares())?;
        weights("time_of_day", &self.time_of_day.weights())?;

        for channel in Channel::PAID {
            let cac = self.cac.get(channel);
            ensure(cac > 0.0, format!("cac.{}", channel.as_str()), format!("must be positive, got {cac}"))?;
        }
        let cheapest_paid = Channel::PAID.iter().map(|c| self.cac.get(*c)).fold(f64::INFINITY, f64::min);
        ensure(self.cac.referral >= 0.0, "cac.referral", "must be non-negative")?;
        ensure(
            self.cac.referral <= cheapest_paid,
            "cac.referral",
            format!("must not exceed the cheapest paid channel ({cheapest_paid})"),
        )?;

        let m = &self.matching;
        probability("matching.designated_repeat_rate", m.designated_repeat_rate)?;
        ensure(m.commute_ceiling_minutes > 0.0, "matching.commute_ceiling_minutes", "must be positive")?;
        ensure(m.average_speed_kmh > 0.0, "matching.average_speed_kmh", "must be positive")?;

        let s = &self.service;
        probability("service.success_rate", s.success_rate)?;
        probability("service.complaint_on_failure", s.complaint_on_failure)?;
        probability("service.complaint_on_unmatched", s.complaint_on_unmatched)?;
        ensure(s.rating_std >= 0.0, "service.rating_std", "must be non-negative")?;

        ensure(self.complaint.window_days >= 1, "complaint.window_days", "must be at least 1")?;
        ensure(
            self.complaint.conversion_coefficient >= 0.0,
            "complaint.conversion_coefficient",
            "must be non-negative",
        )?;

        probability("complaint.resolution_rate", self.complaint.resolution_rate)?;
        for kind in ComplaintType::ALL {
            let t = self.complaint.types.get(kind);
            let label = kind.as_str();
            ensure(t.share >= 0.0, format!("complaint.types.{label}.share"), "must be non-negative")?;
            ensure(
                t.resolution_hours >= 0.0,
                format!("complaint.types.{label}.resolution_hours"),
                "must be non-negative",
            )?;
            probability(&format!("complaint.types.{label}.compensation_ratio"), t.compensation_ratio)?;
        }
        weights("complaint.types", &self.complaint.types.shares())?;

        probability("referral.conversion_rate", self.referral.conversion_rate)?;
        ensure(
            self.referral.passive_threshold <= self.referral.promoter_threshold,
            "referral.passive_threshold",
            "must not exceed promoter_threshold",
        )?;

        let l = &self.lifecycle;
        ensure(l.at_risk_after_days > 0, "lifecycle.at_risk_after_days", "must be positive")?;
        ensure(
            l.at_risk_after_days < l.silent_after_days && l.silent_after_days < l.churned_after_days,
            "lifecycle",
            "thresholds must be strictly increasing",
        )?;
        probability("lifecycle.weekly_reactivation", l.weekly_reactivation)?;

        let sp = &self.supply;
        probability("supply.initial_certified_share", sp.initial_certified_share)?;
        ensure(sp.week1_recruitment >= 0.0, "supply.week1_recruitment", "must be non-negative")?;
        ensure(
            sp.recruitment_floor > 0.0 && sp.recruitment_floor <= 1.0,
            "supply.recruitment_floor",
            "must lie in (0, 1]",
        )?;
        ensure(sp.recruitment_horizon_weeks >= 2, "supply.recruitment_horizon_weeks", "must be at least 2")?;
        probability("supply.training_pass_rate", sp.training_pass_rate)?;
        ensure(sp.basic_daily_capacity >= 1, "supply.basic_daily_capacity", "must be at least 1")?;
        ensure(sp.certified_daily_capacity >= 1, "supply.certified_daily_capacity", "must be at least 1")?;
        probability("supply.monthly_attrition", sp.monthly_attrition)?;
        probability("supply.urban_share", sp.urban_share)?;

        for (i, event) in self.competition.poaching_events.iter().enumerate() {
            ensure(
                event.start_day <= event.end_day,
                format!("competition.poaching_events[{i}]"),
                "start_day must not be after end_day",
            )?;
            ensure(
                event.extra_monthly_attrition >= 0.0,
                format!("competition.poaching_events[{i}].extra_monthly_attrition"),
                "must be non-negative",
            )?;
        }

        for (i, event) in self.policy.events.iter().enumerate() {
            let field = format!("policy.events[{i}]");
            probability(&format!("{field}.daily_probability"), event.daily_probability)?;
            ensure(event.duration_days >= 1, format!("{field}.duration_days"), "must be at least 1")?;
            ensure(event.demand_impact >= -1.0, format!("{field}.demand_impact"), "must not be below -1")?;
            ensure(event.supply_impact >= -1.0, format!("{field}.supply_impact"), "must not be below -1")?;
        }
        Ok(())
    }
}

fn ensure(condition: bool, field: impl Into<String>, reason: impl Into<String>) -> SimResult<()> {
    if condition {
        Ok(())
    } else {
        Err(SimError::config(field, reason))
    }
}

fn probability(field: &str, value: f64) -> SimResult<()> {
    ensure((0.0..=1.0).contains(&value), field, format!("must lie in [0, 1], got {value}"))
}

fn weights(field: &str, values: &[f64]) -> SimResult<()> {
    ensure(values.iter().all(|w| *w >= 0.0), field, "weights must be non-negative")?;
    ensure(values.iter().sum::<f64>() > 0.0, field, "weights must not all be zero")
}
