//! The event log: roster and cohort changes recorded per day.
//!
//! Orders have their own log; this one covers everything else that
//! changes an entity's status. Entries are appended in tick order and
//! never rewritten.

use crate::{
    geo::District,
    lifecycle_subsystem::LifecycleState,
    supply_subsystem::TrainingTier,
    types::{ComplaintType, Day, EscortId, OrderId, UserId},
};
use serde::{Deserialize, Serialize};

/// Variants are append-only; never remove or reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Supply ─────────────────────────────────────
    EscortRecruited {
        day: Day,
        escort_id: EscortId,
        district: District,
    },
    EscortPromoted {
        day: Day,
        escort_id: EscortId,
        tier: TrainingTier,
    },
    EscortFailedTraining {
        day: Day,
        escort_id: EscortId,
    },
    EscortDeparted {
        day: Day,
        escort_id: EscortId,
    },

    // ── Users ──────────────────────────────────────
    UserChurned {
        day: Day,
        user_id: UserId,
    },
    UserReactivated {
        day: Day,
        user_id: UserId,
        from: LifecycleState,
    },
    UserDesignatedEscort {
        day: Day,
        user_id: UserId,
        escort_id: EscortId,
    },
    ReferralAcquired {
        day: Day,
        user_id: UserId,
        referrer: UserId,
    },

    // ── Complaints ─────────────────────────────────
    ComplaintFiled {
        day: Day,
        order_id: OrderId,
        user_id: UserId,
        kind: ComplaintType,
        compensation: f64,
    },
    ComplaintClosed {
        day: Day,
        order_id: OrderId,
        kind: ComplaintType,
        escalated: bool,
    },

    // ── Market conditions ──────────────────────────
    PolicyEventStarted {
        day: Day,
        name: String,
        demand_impact: f64,
        supply_impact: f64,
        until_day: Day,
    },
    PolicyEventEnded {
        day: Day,
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLogEntry {
    pub day:       Day,
    pub subsystem: &'static str,
    pub event:     SimEvent,
}

/// Stable name of an event variant, as stored in exports.
pub fn event_type_name(event: &SimEvent) -> &'static str {
    match event {
        SimEvent::EscortRecruited { .. }      => "escort_recruited",
        SimEvent::EscortPromoted { .. }       => "escort_promoted",
        SimEvent::EscortFailedTraining { .. } => "escort_failed_training",
        SimEvent::EscortDeparted { .. }       => "escort_departed",
        SimEvent::UserChurned { .. }          => "user_churned",
        SimEvent::UserReactivated { .. }      => "user_reactivated",
        SimEvent::UserDesignatedEscort { .. } => "user_designated_escort",
        SimEvent::ReferralAcquired { .. }     => "referral_acquired",
        SimEvent::ComplaintFiled { .. }       => "complaint_filed",
        SimEvent::ComplaintClosed { .. }      => "complaint_closed",
        SimEvent::PolicyEventStarted { .. }   => "policy_event_started",
        SimEvent::PolicyEventEnded { .. }     => "policy_event_ended",
    }
}
