pub mod audit;
pub mod batch;
pub mod clause;
pub mod config;
pub mod critic;
pub mod errors;
pub mod finding;
pub mod logging;
pub mod orchestrator;
pub mod policy;
pub mod reflector;
pub mod report;
pub mod util;
