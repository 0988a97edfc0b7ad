pub mod amortization;
pub mod dcf;
pub mod error;
pub mod metrics;
pub mod model;
pub mod types;
pub mod variables;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

#[cfg(feature = "scenarios")]
pub mod scenarios;

pub use error::RealtyModelError;
pub use types::*;

/// Standard result type for all realty-model operations
pub type RealtyModelResult<T> = Result<T, RealtyModelError>;
