//! Payment decision point and its implementations.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use common::UserId;
use domain::Money;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Default probability that [`RandomPaymentDecider`] accepts a payment.
pub const DEFAULT_ACCEPT_RATE: f64 = 0.98;

/// Outcome of a payment decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentDecision {
    Accepted,
    Declined,
}

impl PaymentDecision {
    /// Returns true if the payment was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, PaymentDecision::Accepted)
    }
}

/// The payment decision point itself failed.
#[derive(Debug, Error)]
#[error("Payment decision unavailable: {0}")]
pub struct PaymentError(pub String);

/// Decides whether a user may be charged an amount.
///
/// Implementations persist nothing. Checkout calls this before writing
/// anything durable.
#[async_trait]
pub trait PaymentDecider: Send + Sync {
    async fn decide(&self, user_id: &UserId, amount: Money)
    -> Result<PaymentDecision, PaymentError>;
}

#[async_trait]
impl<T: PaymentDecider + ?Sized> PaymentDecider for Arc<T> {
    async fn decide(
        &self,
        user_id: &UserId,
        amount: Money,
    ) -> Result<PaymentDecision, PaymentError> {
        (**self).decide(user_id, amount).await
    }
}

/// Accepts payments with a fixed probability.
pub struct RandomPaymentDecider {
    accept_rate: f64,
    rng: Mutex<StdRng>,
}

impl RandomPaymentDecider {
    /// Creates a decider seeded from the operating system.
    ///
    /// `accept_rate` is clamped to `0.0..=1.0`.
    pub fn new(accept_rate: f64) -> Self {
        Self::with_rng(accept_rate, StdRng::from_os_rng())
    }

    /// Creates a decider with a deterministic seed.
    pub fn seeded(accept_rate: f64, seed: u64) -> Self {
        Self::with_rng(accept_rate, StdRng::seed_from_u64(seed))
    }

    /// Creates a decider drawing from `rng`.
    pub fn with_rng(accept_rate: f64, rng: StdRng) -> Self {
        let accept_rate = if accept_rate.is_nan() {
            DEFAULT_ACCEPT_RATE
        } else {
            accept_rate.clamp(0.0, 1.0)
        };
        Self {
            accept_rate,
            rng: Mutex::new(rng),
        }
    }

    /// Returns the configured accept probability.
    pub fn accept_rate(&self) -> f64 {
        self.accept_rate
    }
}

impl Default for RandomPaymentDecider {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPT_RATE)
    }
}

#[async_trait]
impl PaymentDecider for RandomPaymentDecider {
    async fn decide(
        &self,
        _user_id: &UserId,
        _amount: Money,
    ) -> Result<PaymentDecision, PaymentError> {
        let accepted = self
            .rng
            .lock()
            .map_err(|_| PaymentError("random source poisoned".to_string()))?
            .random_bool(self.accept_rate);

        Ok(if accepted {
            PaymentDecision::Accepted
        } else {
            PaymentDecision::Declined
        })
    }
}

#[derive(Debug)]
struct FixedPaymentState {
    decision: PaymentDecision,
    fail: bool,
    calls: usize,
}

/// Payment decider with a configurable outcome, for testing.
#[derive(Debug, Clone)]
pub struct FixedPaymentDecider {
    state: Arc<RwLock<FixedPaymentState>>,
}

impl FixedPaymentDecider {
    /// Creates a decider that always returns `decision`.
    pub fn new(decision: PaymentDecision) -> Self {
        Self {
            state: Arc::new(RwLock::new(FixedPaymentState {
                decision,
                fail: false,
                calls: 0,
            })),
        }
    }

    /// Creates a decider that accepts every payment.
    pub fn accepting() -> Self {
        Self::new(PaymentDecision::Accepted)
    }

    /// Creates a decider that declines every payment.
    pub fn declining() -> Self {
        Self::new(PaymentDecision::Declined)
    }

    /// Changes the decision returned by subsequent calls.
    pub fn set_decision(&self, decision: PaymentDecision) {
        self.write_state().decision = decision;
    }

    /// Configures the decider to fail as if unreachable.
    pub fn set_unavailable(&self, fail: bool) {
        self.write_state().fail = fail;
    }

    /// Returns the number of decisions requested so far.
    pub fn decision_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, FixedPaymentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PaymentDecider for FixedPaymentDecider {
    async fn decide(
        &self,
        _user_id: &UserId,
        _amount: Money,
    ) -> Result<PaymentDecision, PaymentError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| PaymentError("decision state poisoned".to_string()))?;
        state.calls += 1;

        if state.fail {
            return Err(PaymentError("payment provider unreachable".to_string()));
        }

        Ok(state.decision)
    }
}
