use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    #[serde(rename = "production")]
    Production,
    #[serde(rename = "non_production")]
    NonProduction,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// What the fallback policy says about a request whose authorization backend
/// could not be consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// Production never falls back.
    Forbidden,
    /// The operator did not opt in.
    Disabled,
    Granted,
}

/// Decides whether access may be granted while the authorization backend is
/// unreachable.
///
/// The production check is evaluated first and unconditionally. No value of
/// `allow_fallback` changes its outcome.
#[derive(Debug, Clone, Copy)]
pub struct FallbackPolicy {
    environment: Environment,
    allow_fallback: bool,
}

impl FallbackPolicy {
    pub fn new(environment: Environment, allow_fallback: bool) -> Self {
        Self {
            environment,
            allow_fallback,
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Whether `allow_fallback` can take effect at all in this environment.
    pub fn is_fallback_effective(&self) -> bool {
        !self.environment.is_production() && self.allow_fallback
    }

    pub fn on_backend_unavailable(&self) -> FallbackOutcome {
        if self.environment.is_production() {
            return FallbackOutcome::Forbidden;
        }
        if !self.allow_fallback {
            return FallbackOutcome::Disabled;
        }
        FallbackOutcome::Granted
    }
}
