//! Error injection framework for simulated devices.
//!
//! Lets tests and chaos runs make any device operation fail in a controlled
//! way. Operation names are the [`GdxDevice`](crate::device::GdxDevice)
//! method names: `connect`, `select_sensors`, `start`, `calibrate`, `read`,
//! `close`.

use super::rng::MockRng;
use crate::error::{DriverError, DriverErrorKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Error injection configuration for simulated devices
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    /// Per-operation failure rate (0.0 to 1.0), `*` applies to all operations
    failure_rates: Arc<HashMap<&'static str, f64>>,
    /// Specific failure scenarios
    scenarios: Arc<Vec<ErrorScenario>>,
    /// RNG for failure decisions
    rng: Arc<MockRng>,
    /// State tracking for scenarios
    state: Arc<Mutex<ErrorState>>,
}

/// A deterministic failure to inject.
#[derive(Debug, Clone)]
pub enum ErrorScenario {
    /// Let `count` calls of `operation` succeed, fail every later one
    FailAfterN {
        /// Operation name
        operation: &'static str,
        /// Successful calls before failures start
        count: u32,
    },
    /// Every call of `operation` times out
    Timeout {
        /// Operation name
        operation: &'static str,
    },
    /// Every call of `operation` is rejected as an invalid argument
    Reject {
        /// Operation name
        operation: &'static str,
    },
    /// The link drops on the first checked operation and stays down
    CommunicationLoss,
}

#[derive(Default, Debug)]
struct ErrorState {
    /// Operation counters for FailAfterN scenarios
    operation_counts: HashMap<&'static str, u32>,
    /// Whether communication is lost
    communication_lost: bool,
}

impl ErrorConfig {
    /// Create error config with no errors (default)
    pub fn none() -> Self {
        Self::build(HashMap::new(), Vec::new(), None)
    }

    /// Create error config with uniform random failures and optional seed
    pub fn random_failures_seeded(rate: f64, seed: Option<u64>) -> Self {
        let mut rates = HashMap::new();
        rates.insert("*", rate);
        Self::build(rates, Vec::new(), seed)
    }

    /// Create error config with a single scenario
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    /// Create error config with multiple scenarios
    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self::build(HashMap::new(), scenarios, None)
    }

    /// Create error config with custom failure rates per operation
    pub fn with_rates(rates: HashMap<&'static str, f64>) -> Self {
        Self::build(rates, Vec::new(), None)
    }

    fn build(
        rates: HashMap<&'static str, f64>,
        scenarios: Vec<ErrorScenario>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            failure_rates: Arc::new(rates),
            scenarios: Arc::new(scenarios),
            rng: Arc::new(MockRng::new(seed)),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Check if an operation should fail and return appropriate error
    pub fn check_operation(
        &self,
        driver_type: &str,
        operation: &'static str,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock();

        if state.communication_lost {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Communication,
                "Communication lost",
            ));
        }

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::FailAfterN {
                    operation: op,
                    count,
                } if *op == operation => {
                    let current = state.operation_counts.entry(operation).or_insert(0);
                    *current += 1;
                    if *current > *count {
                        return Err(DriverError::new(
                            driver_type,
                            DriverErrorKind::Hardware,
                            format!("Injected failure after {} '{}' operations", count, operation),
                        ));
                    }
                }
                ErrorScenario::Timeout { operation: op } if *op == operation => {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Timeout,
                        format!("Operation '{}' timed out", operation),
                    ));
                }
                ErrorScenario::Reject { operation: op } if *op == operation => {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::InvalidParameter,
                        format!("Operation '{}' rejected", operation),
                    ));
                }
                ErrorScenario::CommunicationLoss => {
                    state.communication_lost = true;
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Communication,
                        "Communication lost",
                    ));
                }
                _ => {}
            }
        }

        let rate = self
            .failure_rates
            .get(operation)
            .or_else(|| self.failure_rates.get("*"))
            .copied()
            .unwrap_or(0.0);

        if self.rng.should_fail(rate) {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Hardware,
                format!("Random failure on operation '{}'", operation),
            ));
        }

        Ok(())
    }

    /// Reset error state (clear counters, restore the link)
    pub fn reset(&self) {
        *self.state.lock() = ErrorState::default();
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_errors() {
        let config = ErrorConfig::none();
        for _ in 0..100 {
            assert!(config.check_operation("test_driver", "read").is_ok());
        }
    }

    #[test]
    fn test_random_failures() {
        let config = ErrorConfig::random_failures_seeded(0.5, Some(42));
        let failures = (0..1000)
            .filter(|_| config.check_operation("test_driver", "read").is_err())
            .count();
        // Expect roughly 50% failures
        assert!(failures > 400 && failures < 600, "Got {} failures", failures);
    }

    #[test]
    fn test_fail_after_n() {
        let config = ErrorConfig::scenario(ErrorScenario::FailAfterN {
            operation: "read",
            count: 5,
        });

        for i in 0..5 {
            assert!(
                config.check_operation("test_driver", "read").is_ok(),
                "Operation {} should succeed",
                i + 1
            );
        }
        for i in 5..10 {
            assert!(
                config.check_operation("test_driver", "read").is_err(),
                "Operation {} should fail",
                i + 1
            );
        }
        // Other operations are unaffected
        assert!(config.check_operation("test_driver", "start").is_ok());
    }

    #[test]
    fn test_timeout_scenario() {
        let config = ErrorConfig::scenario(ErrorScenario::Timeout {
            operation: "connect",
        });

        let err = config.check_operation("test_driver", "connect").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Timeout);
        assert!(err.message.contains("timed out"));
    }

    #[test]
    fn test_reject_scenario() {
        let config = ErrorConfig::scenario(ErrorScenario::Reject { operation: "start" });
        let err = config.check_operation("test_driver", "start").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::InvalidParameter);
    }

    #[test]
    fn test_communication_loss_is_sticky() {
        let config = ErrorConfig::scenario(ErrorScenario::CommunicationLoss);

        let err = config.check_operation("test_driver", "read").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Communication);

        let err = config.check_operation("test_driver", "close").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Communication);
    }

    #[test]
    fn test_reset() {
        let config = ErrorConfig::scenario(ErrorScenario::FailAfterN {
            operation: "read",
            count: 2,
        });

        assert!(config.check_operation("test_driver", "read").is_ok());
        assert!(config.check_operation("test_driver", "read").is_ok());
        assert!(config.check_operation("test_driver", "read").is_err());

        config.reset();

        assert!(config.check_operation("test_driver", "read").is_ok());
        assert!(config.check_operation("test_driver", "read").is_ok());
        assert!(config.check_operation("test_driver", "read").is_err());
    }

    #[test]
    fn test_custom_rates() {
        let mut rates = HashMap::new();
        rates.insert("read", 1.0);
        rates.insert("start", 0.0);

        let config = ErrorConfig::with_rates(rates);

        for _ in 0..10 {
            assert!(config.check_operation("test_driver", "read").is_err());
            assert!(config.check_operation("test_driver", "start").is_ok());
        }
    }
}
