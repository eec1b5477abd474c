//! Target-controlled infusion simulation core.
//!
//! Given a compartmental pharmacokinetic/pharmacodynamic drug model and an
//! ordered list of plasma or effect-site concentration targets, the crate
//! derives the timed infusion schedule that drives the simulated patient to
//! each target and produces the resulting concentration trajectories.
//!
//! The entry point is [`Pump`]: construct it from a [`DrugModel`] and a
//! [`PumpConfig`], add targets and any user-defined infusions, then call
//! [`Pump::generate_infusions`] for the schedule alone or [`Pump::run`] for
//! the schedule plus the simulated plasma and effect-site curves.

pub mod config;
pub mod dosing;
pub mod error;
pub mod models;
pub mod output;
pub mod pkpd;
pub mod pump;
pub mod solver;

pub use config::PumpConfig;
pub use error::{TciError, TciResult, Warning};
pub use models::{Compartments, Disposition, DrugModel, Infusion, Target, TargetEffect};
pub use output::{ConcentrationPoint, DoseInterval, DoseWeightPoint, RatePoint, TargetPoint};
pub use pkpd::PkPdModel;
pub use pump::Pump;
