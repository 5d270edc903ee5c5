pub mod prompt;
mod simulator;
mod types;

pub use simulator::run_simulation;
pub use types::{
    MAX_SIMULATION_YEARS, PROFILE_FIELDS, ProfileError, ProfileInput, SIMULATION_FIELDS,
    SimulationError, SimulationInput, SimulationResult, YearBreakdown,
};
