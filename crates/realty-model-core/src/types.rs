use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RealtyModelError;
use crate::RealtyModelResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%).
pub type Rate = Decimal;

/// Rates expressed as percentages (6.5 = 6.5%). Every rate on the model
/// records uses this convention.
pub type Percent = Decimal;

/// Multiples (e.g., 1.8x equity multiple)
pub type Multiple = Decimal;

/// Outcome of an iterative or closed-form rate solve (IRR, MIRR).
///
/// `value` is always the last estimate in percent; only trust it when
/// `converged` is true.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSolution {
    pub value: Percent,
    pub converged: bool,
    pub iterations: u32,
}

impl RateSolution {
    pub fn converged(value: Percent, iterations: u32) -> Self {
        RateSolution {
            value,
            converged: true,
            iterations,
        }
    }

    pub fn not_converged(value: Percent, iterations: u32) -> Self {
        RateSolution {
            value,
            converged: false,
            iterations,
        }
    }

    /// Return the rate, or a `ConvergenceFailure` if the solve did not converge.
    pub fn require_converged(&self, function: &str) -> RealtyModelResult<Percent> {
        if self.converged {
            Ok(self.value)
        } else {
            Err(RealtyModelError::ConvergenceFailure {
                function: function.into(),
                iterations: self.iterations,
                last_delta: self.value,
            })
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_require_converged() {
        let ok = RateSolution::converged(dec!(8.5), 4);
        assert_eq!(ok.require_converged("IRR").unwrap(), dec!(8.5));

        let bad = RateSolution::not_converged(dec!(9999), 100);
        assert!(matches!(
            bad.require_converged("IRR"),
            Err(RealtyModelError::ConvergenceFailure { iterations: 100, .. })
        ));
    }

    #[test]
    fn test_envelope_metadata() {
        let out = with_metadata("Test", &serde_json::json!({"a": 1}), vec![], 12, dec!(1));
        assert_eq!(out.methodology, "Test");
        assert_eq!(out.metadata.computation_time_us, 12);
        assert_eq!(out.metadata.precision, "rust_decimal_128bit");
        assert_eq!(out.assumptions["a"], 1);
    }
}
