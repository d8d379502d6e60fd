//! Hardware backends for the filter wheel: a simulated mechanism for tests and
//! demos, and real drivers behind the `hardware` feature.

pub mod error;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod as5600;
#[cfg(feature = "hardware")]
pub mod uln2003;

pub use error::HwError;
pub use sim::{SimParams, SimulatedEncoder, SimulatedMotor, SimulatedWheel};

#[cfg(feature = "hardware")]
pub use as5600::As5600;
#[cfg(feature = "hardware")]
pub use uln2003::Uln2003;
