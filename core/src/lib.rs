pub mod cli;
pub mod config;
pub mod executor;
pub mod logging;
pub mod runner;
pub mod services;

// Re-export main types
pub use executor::{
    Engine, EngineOptions, ExecutionException, Program, RuntimeError, Scope, StepRecord, Value,
};
pub use runner::{RunOutcome, RunReport, Runner};
pub use services::{MockServiceHost, NullHost, ServiceError, ServiceHost, ServiceRequest};
