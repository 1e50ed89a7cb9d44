//! Payment gateway port and the sandbox adapter

use crate::error::ContestError;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use uuid::Uuid;
use wallet_ledger::{Money, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    #[serde(rename = "paypal")]
    PayPal,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::PayPal => "paypal",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ContestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "paypal" => Ok(PaymentMethod::PayPal),
            other => Err(ContestError::UnsupportedMethod { method: other.to_string() }),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payout fields as submitted with a withdrawal request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDetails {
    pub bank_account: Option<String>,
    pub routing_number: Option<String>,
    pub paypal_email: Option<String>,
}

/// Where a payout goes, once the method's required fields are known present
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutDestination {
    Bank { account: String, routing: String },
    PayPal { email: String },
}

impl PayoutDestination {
    pub fn from_details(
        method: PaymentMethod,
        details: &PayoutDetails,
    ) -> Result<Self, ContestError> {
        fn present(field: &Option<String>) -> Option<String> {
            field.as_deref().map(str::trim).filter(|value| !value.is_empty()).map(String::from)
        }

        match method {
            PaymentMethod::BankTransfer => {
                match (present(&details.bank_account), present(&details.routing_number)) {
                    (Some(account), Some(routing)) => Ok(PayoutDestination::Bank { account, routing }),
                    (account, routing) => {
                        let mut missing = Vec::new();
                        if account.is_none() {
                            missing.push("bank_account");
                        }
                        if routing.is_none() {
                            missing.push("routing_number");
                        }
                        Err(ContestError::MissingPayoutDetails { method, missing })
                    }
                }
            }
            PaymentMethod::PayPal => match present(&details.paypal_email) {
                Some(email) => Ok(PayoutDestination::PayPal { email }),
                None => Err(ContestError::MissingPayoutDetails {
                    method,
                    missing: vec!["paypal_email"],
                }),
            },
            PaymentMethod::Card => {
                Err(ContestError::UnsupportedMethod { method: "card payouts".to_string() })
            }
        }
    }

    /// Safe to log or store: only the tail of the account identifier
    pub fn masked(&self) -> String {
        fn tail(value: &str) -> String {
            let chars: Vec<char> = value.chars().collect();
            let start = chars.len().saturating_sub(4);
            chars[start..].iter().collect()
        }

        match self {
            PayoutDestination::Bank { account, .. } => format!("bank ****{}", tail(account)),
            PayoutDestination::PayPal { email } => match email.split_once('@') {
                Some((_, domain)) => format!("paypal ***@{domain}"),
                None => "paypal ***".to_string(),
            },
        }
    }
}

/// Proof that the provider captured a deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub reference: String,
    pub user_id: UserId,
    pub amount: Money,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutHandle {
    pub reference: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("declined: {reason}")]
    Declined { reason: String },

    #[error("unavailable: {message}")]
    Unavailable { message: String },
}

/// External payment provider
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Capture funds for a deposit
    async fn authorize_deposit(
        &self,
        user_id: UserId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<PaymentReceipt, GatewayError>;

    /// Return a captured deposit to its source
    async fn refund_deposit(&self, receipt: &PaymentReceipt) -> Result<(), GatewayError>;

    /// Start sending money out; completion is reported back asynchronously
    async fn initiate_payout(
        &self,
        user_id: UserId,
        amount: Money,
        destination: &PayoutDestination,
    ) -> Result<PayoutHandle, GatewayError>;
}

/// Deterministic stand-in for the payment provider
///
/// Everything succeeds unless a user is declined or the gateway is switched
/// offline. Captured deposits and refunds are remembered for inspection.
#[derive(Debug, Default)]
pub struct SandboxGateway {
    declined: DashSet<UserId>,
    offline: AtomicBool,
    refunds_offline: AtomicBool,
    captured: DashMap<String, PaymentReceipt>,
    refunded: DashSet<String>,
    payouts: DashMap<String, Money>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decline_user(&self, user_id: UserId) {
        self.declined.insert(user_id);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make only refunds fail
    pub fn set_refunds_offline(&self, offline: bool) {
        self.refunds_offline.store(offline, Ordering::SeqCst);
    }

    pub fn captured_count(&self) -> usize {
        self.captured.len()
    }

    pub fn was_refunded(&self, reference: &str) -> bool {
        self.refunded.contains(reference)
    }

    pub fn payout_count(&self) -> usize {
        self.payouts.len()
    }

    fn ensure_online(&self) -> Result<(), GatewayError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable { message: "sandbox is offline".to_string() });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PaymentGateway for SandboxGateway {
    async fn authorize_deposit(
        &self,
        user_id: UserId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<PaymentReceipt, GatewayError> {
        self.ensure_online()?;
        if self.declined.contains(&user_id) {
            return Err(GatewayError::Declined { reason: "card declined by issuer".to_string() });
        }

        let receipt = PaymentReceipt {
            reference: format!("sbx_dep_{}", Uuid::new_v4().simple()),
            user_id,
            amount,
            method,
        };
        self.captured.insert(receipt.reference.clone(), receipt.clone());
        tracing::debug!("Sandbox captured {} for user {} ({})", amount, user_id, receipt.reference);
        Ok(receipt)
    }

    async fn refund_deposit(&self, receipt: &PaymentReceipt) -> Result<(), GatewayError> {
        self.ensure_online()?;
        if self.refunds_offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable { message: "refunds are offline".to_string() });
        }
        self.refunded.insert(receipt.reference.clone());
        Ok(())
    }

    async fn initiate_payout(
        &self,
        user_id: UserId,
        amount: Money,
        destination: &PayoutDestination,
    ) -> Result<PayoutHandle, GatewayError> {
        self.ensure_online()?;
        if self.declined.contains(&user_id) {
            return Err(GatewayError::Declined { reason: "payout destination rejected".to_string() });
        }

        let reference = format!("sbx_out_{}", Uuid::new_v4().simple());
        self.payouts.insert(reference.clone(), amount);
        tracing::debug!("Sandbox payout {} of {} to {}", reference, amount, destination.masked());
        Ok(PayoutHandle { reference })
    }
}
