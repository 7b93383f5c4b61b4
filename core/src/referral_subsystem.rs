//! Satisfaction scoring, NPS classification and word-of-mouth referrals.
//!
//! Referrals found today are published as tomorrow's feedback; the
//! demand generator turns them into referral-channel users on the next
//! day, never the same day.

use crate::{
    config::ReferralConfig,
    error::SimResult,
    event::SimEvent,
    geo::District,
    lifecycle_subsystem::{Experience, LifecycleState, User},
    market::Market,
    order::MatchTier,
    rng::SubsystemRng,
    subsystem::SimSubsystem,
    types::{Day, UserId},
};
use serde::{Deserialize, Serialize};
use std::any::Any;

const UNMATCHED_SCORE: f64 = 2.0;
const FAILED_SERVICE_SCORE: f64 = 4.0;
const COMPLAINT_PENALTY: f64 = 1.5;
const MAX_COUNTED_COMPLAINTS: u32 = 3;
const LOYALTY_BONUS: f64 = 0.125;
const MAX_COUNTED_ORDERS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpsCategory {
    Promoter,
    Passive,
    Detractor,
}

/// A friend who will sign up tomorrow because of `referrer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralArrival {
    pub referrer: UserId,
    pub district: District,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NpsSummary {
    pub promoters:  u32,
    pub passives:   u32,
    pub detractors: u32,
}

impl NpsSummary {
    /// (promoters − detractors) / classified × 100; zero when nobody is classified.
    pub fn composite(&self) -> f64 {
        let total = self.promoters + self.passives + self.detractors;
        if total == 0 {
            return 0.0;
        }
        (self.promoters as f64 - self.detractors as f64) / total as f64 * 100.0
    }
}

fn tier_bonus(tier: MatchTier) -> f64 {
    match tier {
        MatchTier::Designated => 0.5,
        MatchTier::Historical => 0.25,
        MatchTier::Geographic | MatchTier::Unmatched => 0.0,
    }
}

/// Satisfaction on a 0-10 scale.
pub fn satisfaction_score(experience: &Experience, complaints: u32, order_count: u32) -> f64 {
    let base = if experience.tier == MatchTier::Unmatched {
        UNMATCHED_SCORE
    } else if !experience.served {
        FAILED_SERVICE_SCORE
    } else {
        experience.rating.unwrap_or(FAILED_SERVICE_SCORE / 2.0) * 2.0 + tier_bonus(experience.tier)
    };
    let penalty = COMPLAINT_PENALTY * complaints.min(MAX_COUNTED_COMPLAINTS) as f64;
    let loyalty = LOYALTY_BONUS * order_count.min(MAX_COUNTED_ORDERS) as f64;
    (base - penalty + loyalty).clamp(0.0, 10.0)
}

pub fn classify(score: f64, config: &ReferralConfig) -> NpsCategory {
    if score >= config.promoter_threshold {
        NpsCategory::Promoter
    } else if score >= config.passive_threshold {
        NpsCategory::Passive
    } else {
        NpsCategory::Detractor
    }
}

pub struct ReferralEngine {
    config: ReferralConfig,
    pub total_referrals: u64,
}

impl ReferralEngine {
    pub fn new(config: ReferralConfig) -> Self {
        Self { config, total_referrals: 0 }
    }

    /// Classify every active user with an experience; promoters served
    /// today spread the word.
    pub fn score_day(&mut self, day: Day, users: &mut [User], rng: &mut SubsystemRng) -> (NpsSummary, Vec<ReferralArrival>) {
        let mut summary = NpsSummary::default();
        let mut arrivals = Vec::new();

        for user in users.iter_mut().filter(|u| u.state == LifecycleState::Active) {
            let Some(experience) = user.last_experience else {
                continue;
            };
            let score = satisfaction_score(&experience, user.complaint_count, user.order_count);
            let category = classify(score, &self.config);
            user.nps = Some(category);
            match category {
                NpsCategory::Promoter  => summary.promoters += 1,
                NpsCategory::Passive   => summary.passives += 1,
                NpsCategory::Detractor => summary.detractors += 1,
            }

            if category == NpsCategory::Promoter && experience.day == day && experience.served {
                let referred = rng.binomial(self.config.social_reach, self.config.conversion_rate);
                for _ in 0..referred {
                    arrivals.push(ReferralArrival { referrer: user.id, district: user.district });
                }
            }
        }

        self.total_referrals += arrivals.len() as u64;
        log::debug!(
            "day={day} referral: promoters={} passives={} detractors={} referred={}",
            summary.promoters, summary.passives, summary.detractors, arrivals.len()
        );
        (summary, arrivals)
    }
}

impl SimSubsystem for ReferralEngine {
    fn name(&self) -> &'static str {
        "referral"
    }

    fn update(
        &mut self,
        day: Day,
        market: &mut Market,
        _events_in: &[SimEvent],
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let (nps, referrals) = self.score_day(day, &mut market.users, rng);
        market.today.nps = nps;
        market.today.next_inputs.referrals = referrals;
        Ok(Vec::new())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
