pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod orchestrator;
pub mod proxy;
pub mod ramp;
pub mod report;
pub mod stats;
pub mod token;

pub use config::*;
pub use dispatcher::*;
pub use executor::*;
pub use orchestrator::*;
pub use proxy::*;
pub use ramp::*;
pub use report::*;
pub use stats::*;
pub use token::*;
