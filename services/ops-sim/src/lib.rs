// services/ops-sim/src/lib.rs
//
// Retail operations telemetry simulator - library exports
//

pub mod clock;
pub mod config;
pub mod mock;
pub mod panels;
pub mod publisher;
pub mod simulation;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PublisherConfig, SimulatorConfig};
pub use mock::ComplianceSimulation;
pub use publisher::{LifecycleState, Observer, Publisher, Subscription, WeakPublisher};
pub use simulation::{Bounded, Simulation, TickContext};
pub use state::ComplianceSnapshot;
