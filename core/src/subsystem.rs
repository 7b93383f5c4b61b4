//! Subsystem trait and registry.
//!
//! RULE: Every daily stage implements SimSubsystem.
//! The engine calls update() on each registered subsystem
//! in registration order, every tick.
//! Execution order is fixed and documented in engine.rs.

use crate::{
    error::SimResult,
    event::SimEvent,
    market::Market,
    rng::SubsystemRng,
    types::Day,
};
use std::any::Any;

/// The contract every subsystem must fulfill.
pub trait SimSubsystem: Send {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Called once per day by the engine.
    ///
    /// - `day`:       the current day
    /// - `market`:    users, escorts and today's ledger, shared by all stages
    /// - `events_in`: events emitted by earlier subsystems this day
    /// - `rng`:       this subsystem's deterministic RNG for this day
    ///
    /// Returns a vec of new events to add to the day's event log.
    fn update(
        &mut self,
        day: Day,
        market: &mut Market,
        events_in: &[SimEvent],
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>>;

    /// For downcasting in trial summaries, tests and tooling.
    /// Stages never downcast each other.
    fn as_any(&self) -> &dyn Any;
}
