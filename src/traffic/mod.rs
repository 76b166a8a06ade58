//! CPU traffic simulation: level model, load generators and the controller that drives them.

pub mod controller;
pub mod generator;
pub mod types;

pub use controller::TrafficController;
pub use types::{EmergencyKind, SimulationState, TrafficLevel};
