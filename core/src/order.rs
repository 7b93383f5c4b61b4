//! Orders and their single resolution.
//!
//! An order is created `Pending` by the demand generator and resolved
//! exactly once, within the same day, into `Matched`, `Unmatched` or
//! `Cancelled`. Resolved orders go to the order log and are never
//! mutated again.

use crate::{
    error::{SimError, SimResult},
    geo::District,
    types::{ComplaintType, Day, EscortId, OrderId, TimeSlot, TimeWindow, UserId},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Pending,
    Matched,
    Unmatched,
    Cancelled,
}

/// Which matching tier produced the assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Designated,
    Historical,
    Geographic,
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched:         bool,
    pub escort:          Option<EscortId>,
    pub distance_km:     Option<f64>,
    pub commute_minutes: Option<f64>,
    pub tier:            MatchTier,
}

impl MatchResult {
    pub fn unmatched() -> Self {
        Self { matched: false, escort: None, distance_km: None, commute_minutes: None, tier: MatchTier::Unmatched }
    }

    pub fn assigned(escort: EscortId, distance_km: f64, commute_minutes: f64, tier: MatchTier) -> Self {
        Self {
            matched: true,
            escort: Some(escort),
            distance_km: Some(distance_km),
            commute_minutes: Some(commute_minutes),
            tier,
        }
    }
}

/// How a matched appointment went.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceOutcome {
    pub completed: bool,
    /// 1-5 stars; only set for completed services.
    pub rating:    Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id:              OrderId,
    pub user:            UserId,
    pub day:             Day,
    pub district:        District,
    pub slot:            TimeSlot,
    pub window:          TimeWindow,
    pub designated_hint: Option<EscortId>,
    pub price:           f64,
    /// False for a user's first order.
    pub repeat:          bool,
    pub state:           OrderState,
    pub escort:          Option<EscortId>,
    pub tier:            Option<MatchTier>,
    pub distance_km:     Option<f64>,
    pub commute_minutes: Option<f64>,
    pub service:         Option<ServiceOutcome>,
    pub complaint:       bool,
    pub complaint_type:  Option<ComplaintType>,
    /// Refund paid out on a complaint.
    pub compensation:    f64,
}

impl Order {
    pub fn new(id: OrderId, user: UserId, day: Day, district: District, slot: TimeSlot, price: f64) -> Self {
        Self {
            id,
            user,
            day,
            district,
            slot,
            window: slot.window(),
            designated_hint: None,
            price,
            repeat: false,
            state: OrderState::Pending,
            escort: None,
            tier: None,
            distance_km: None,
            commute_minutes: None,
            service: None,
            complaint: false,
            complaint_type: None,
            compensation: 0.0,
        }
    }

    pub fn with_designated(mut self, escort: Option<EscortId>) -> Self {
        self.designated_hint = escort;
        self
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Resolve a pending order from the matcher's verdict.
    pub fn resolve(mut self, result: &MatchResult, service: Option<ServiceOutcome>) -> SimResult<Order> {
        self.ensure_pending()?;
        if result.matched {
            self.state = OrderState::Matched;
            self.escort = result.escort;
            self.distance_km = result.distance_km;
            self.commute_minutes = result.commute_minutes;
            self.service = service;
        } else {
            self.state = OrderState::Unmatched;
        }
        self.tier = Some(result.tier);
        Ok(self)
    }

    pub fn cancel(mut self) -> SimResult<Order> {
        self.ensure_pending()?;
        self.state = OrderState::Cancelled;
        Ok(self)
    }

    pub fn with_complaint(mut self, complaint: bool) -> Self {
        self.complaint = complaint;
        self
    }

    /// File a typed complaint refunding `compensation_ratio` of the price.
    pub fn file_complaint(mut self, kind: ComplaintType, compensation_ratio: f64) -> Self {
        self.complaint = true;
        self.complaint_type = Some(kind);
        self.compensation = self.price * compensation_ratio;
        self
    }

    /// Matched and the appointment was carried out.
    pub fn is_completed(&self) -> bool {
        self.state == OrderState::Matched && self.service.is_some_and(|s| s.completed)
    }

    /// Order value that counts toward GMV.
    pub fn gmv(&self) -> f64 {
        if self.is_completed() { self.price } else { 0.0 }
    }

    /// GMV after complaint compensation. Negative when a refund was paid
    /// on an order that was never served.
    pub fn net_gmv(&self) -> f64 {
        self.gmv() - self.compensation
    }

    fn ensure_pending(&self) -> SimResult<()> {
        if self.state != OrderState::Pending {
            return Err(SimError::inconsistency(
                self.day,
                format!("order {} resolved twice (already {:?})", self.id, self.state),
            ));
        }
        Ok(())
    }
}
