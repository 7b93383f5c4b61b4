//! Discrete-time simulator for a companion-to-medical-appointment escort
//! marketplace: daily demand, three-tier escort matching, cohort
//! lifecycle with complaint and referral feedback, escort supply under
//! competition and policy risk, and Monte Carlo scenario bands.

pub mod clock;
pub mod complaint_subsystem;
pub mod conditions_subsystem;
pub mod config;
pub mod demand_subsystem;
pub mod engine;
pub mod error;
pub mod event;
pub mod geo;
pub mod lifecycle_subsystem;
pub mod market;
pub mod matching_subsystem;
pub mod monte_carlo;
pub mod order;
pub mod referral_subsystem;
pub mod rng;
pub mod snapshot;
pub mod subsystem;
pub mod supply_subsystem;
pub mod types;

pub use config::SimConfig;
pub use engine::SimEngine;
pub use error::{SimError, SimResult};
pub use monte_carlo::{run_simulation, SimulationOutput};
