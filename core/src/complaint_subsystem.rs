//! Complaint feedback: typed complaints, refunds, a rolling window of
//! complaint and order counts, and the conversion penalty it implies.
//!
//! Execution, once the day's orders are resolved:
//!   1. Each resolved order may draw a complaint; a complaint draws its
//!      type, and the type fixes the refund paid against the order price
//!   2. The day's complaints and orders enter the rolling window
//!   3. Open complaints past their resolution time are closed, or escalated
//!   4. The penalty is published for tomorrow's demand
//!
//! The penalty computed at the end of day d is what demand sees on day
//! d+1. Nothing reads it on the day it is computed.

use crate::{
    config::{ComplaintConfig, ServiceConfig},
    error::{SimError, SimResult},
    event::SimEvent,
    market::Market,
    order::{Order, OrderState},
    rng::SubsystemRng,
    subsystem::SimSubsystem,
    types::{ComplaintTally, ComplaintType, Day, OrderId},
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::VecDeque;

const HOURS_PER_DAY: f64 = 24.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DayTally {
    pub complaints: u32,
    pub orders:     u32,
}

/// A complaint still being handled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenComplaint {
    pub order_id: OrderId,
    pub kind:     ComplaintType,
    pub filed:    Day,
    /// First day the complaint can be closed.
    pub due:      Day,
}

/// Conversion points lost for a complaint rate: `rate × coefficient`,
/// never negative.
pub fn conversion_reduction(complaint_rate: f64, coefficient: f64) -> f64 {
    (complaint_rate * coefficient).max(0.0)
}

/// Conversion after the penalty, floored at zero.
pub fn adjusted_conversion(base_conversion: f64, reduction: f64) -> f64 {
    (base_conversion - reduction).max(0.0)
}

/// Probability that a resolved order leads to a complaint.
pub fn complaint_probability(order: &Order, config: &ServiceConfig) -> f64 {
    match order.state {
        OrderState::Unmatched => config.complaint_on_unmatched,
        OrderState::Matched if !order.is_completed() => config.complaint_on_failure,
        _ => 0.0,
    }
}

/// Whole days a complaint stays open, at least one.
pub fn resolution_days(resolution_hours: f64) -> Day {
    ((resolution_hours / HOURS_PER_DAY).ceil() as Day).max(1)
}

pub struct ComplaintFeedback {
    config:  ComplaintConfig,
    service: ServiceConfig,
    window:  VecDeque<DayTally>,
    open:    Vec<OpenComplaint>,
    pub total_complaints:   u64,
    pub by_type:            ComplaintTally,
    pub resolved:           u64,
    pub escalated:          u64,
    pub total_compensation: f64,
    /// Users who ordered again after complaining.
    pub repurchased_after_complaint: u64,
}

impl ComplaintFeedback {
    pub fn new(config: ComplaintConfig) -> Self {
        let window = VecDeque::with_capacity(config.window_days);
        Self {
            config,
            service: ServiceConfig::default(),
            window,
            open: Vec::new(),
            total_complaints: 0,
            by_type: ComplaintTally::default(),
            resolved: 0,
            escalated: 0,
            total_compensation: 0.0,
            repurchased_after_complaint: 0,
        }
    }

    /// Complaint probabilities come from the service configuration.
    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.service = service;
        self
    }

    /// Close out a day. The oldest day falls out once the window is full.
    pub fn record_day(&mut self, day: Day, complaints: u32, orders: u32) {
        self.window.push_back(DayTally { complaints, orders });
        while self.window.len() > self.config.window_days {
            self.window.pop_front();
        }
        self.total_complaints += complaints as u64;
        log::debug!(
            "day={day} complaint: today={complaints}/{orders} window_rate={:.4} reduction={:.4}",
            self.complaint_rate(),
            self.conversion_reduction()
        );
    }

    /// complaints / max(orders, 1) over the window.
    pub fn complaint_rate(&self) -> f64 {
        let complaints: u32 = self.window.iter().map(|d| d.complaints).sum();
        let orders: u32 = self.window.iter().map(|d| d.orders).sum();
        complaints as f64 / orders.max(1) as f64
    }

    pub fn conversion_reduction(&self) -> f64 {
        conversion_reduction(self.complaint_rate(), self.config.conversion_coefficient)
    }

    pub fn open_complaints(&self) -> &[OpenComplaint] {
        &self.open
    }

    /// Share of closed complaints that were resolved rather than escalated.
    pub fn resolution_rate(&self) -> f64 {
        let closed = self.resolved + self.escalated;
        if closed == 0 {
            return 0.0;
        }
        self.resolved as f64 / closed as f64
    }

    /// Draw the type of a complaint on `order` and attach its refund.
    pub fn file(&mut self, day: Day, order: Order, rng: &mut SubsystemRng) -> (Order, SimEvent) {
        let kind = ComplaintType::ALL[rng.pick_weighted(&self.config.types.shares())];
        let params = self.config.types.get(kind);
        let filed = order.file_complaint(kind, params.compensation_ratio);
        let event = SimEvent::ComplaintFiled {
            day,
            order_id: filed.id,
            user_id: filed.user,
            kind,
            compensation: filed.compensation,
        };
        self.open.push(OpenComplaint {
            order_id: filed.id,
            kind,
            filed: day,
            due: day + resolution_days(params.resolution_hours),
        });
        self.by_type.add(kind);
        self.total_compensation += filed.compensation;
        (filed, event)
    }

    /// Close every open complaint that is due on `day`, in filing order.
    pub fn close_due(&mut self, day: Day, rng: &mut SubsystemRng) -> Vec<SimEvent> {
        let mut events = Vec::new();
        let mut still_open = Vec::with_capacity(self.open.len());
        for complaint in std::mem::take(&mut self.open) {
            if complaint.due > day {
                still_open.push(complaint);
                continue;
            }
            let escalated = !rng.chance(self.config.resolution_rate);
            if escalated {
                self.escalated += 1;
            } else {
                self.resolved += 1;
            }
            events.push(SimEvent::ComplaintClosed { day, order_id: complaint.order_id, kind: complaint.kind, escalated });
        }
        self.open = still_open;
        events
    }
}

impl SimSubsystem for ComplaintFeedback {
    fn name(&self) -> &'static str {
        "complaint"
    }

    fn update(
        &mut self,
        day: Day,
        market: &mut Market,
        _events_in: &[SimEvent],
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        let mut complaints = 0u32;
        let mut compensation = 0.0;

        for order in std::mem::take(&mut market.today.resolved) {
            let user = market
                .users
                .get_mut(order.user.0 as usize)
                .ok_or_else(|| SimError::inconsistency(day, format!("unknown user {}", order.user)))?;
            if order.repeat && user.unrecovered_complaint {
                user.unrecovered_complaint = false;
                self.repurchased_after_complaint += 1;
            }

            let order = if rng.chance(complaint_probability(&order, &self.service)) {
                let (filed, event) = self.file(day, order, rng);
                user.complaint_count += 1;
                user.unrecovered_complaint = true;
                complaints += 1;
                compensation += filed.compensation;
                events.push(event);
                filed
            } else {
                order
            };
            market.order_log.push(order);
        }

        let today = &mut market.today;
        today.outcome.complaints = complaints;
        today.outcome.compensation = compensation;
        self.record_day(day, complaints, today.outcome.orders);
        events.extend(self.close_due(day, rng));

        today.complaint_rate = self.complaint_rate();
        today.next_inputs.conversion_reduction = self.conversion_reduction();
        Ok(events)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
