//! Wallet funding: deposits, withdrawals and payout confirmation

use crate::config::WalletLimits;
use crate::error::ContestError;
use crate::payment::{PaymentGateway, PaymentMethod, PayoutDestination, PayoutDetails};
use crate::repository::{self, IdentityProvider};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use wallet_ledger::{
    Delta, Ledger, Money, Transaction, TransactionId, TransactionKind, TransactionStatus, UserId,
};

const PROCESSING_TIME: &str = "1-3 business days";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositReceipt {
    pub amount: Money,
    pub new_balance: Money,
    pub transaction_id: TransactionId,
    pub payment_reference: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalReceipt {
    pub amount: Money,
    pub fee: Money,
    pub total: Money,
    pub new_balance: Money,
    pub status: TransactionStatus,
    pub transaction_id: TransactionId,
    pub fee_transaction_id: TransactionId,
    pub payout_reference: String,
    pub estimated_processing_time: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutResolution {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    /// Amount returned to the wallet when the payout failed
    pub refunded: Option<Money>,
    pub new_balance: Money,
}

/// Moves money between wallets and the payment provider
pub struct WalletFundingService {
    ledger: Arc<Ledger>,
    identity: Arc<dyn IdentityProvider>,
    gateway: Arc<dyn PaymentGateway>,
    limits: WalletLimits,
}

impl WalletFundingService {
    pub fn new(
        ledger: Arc<Ledger>,
        identity: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn PaymentGateway>,
        limits: WalletLimits,
    ) -> Self {
        Self { ledger, identity, gateway, limits }
    }

    pub fn limits(&self) -> &WalletLimits {
        &self.limits
    }

    async fn is_verified(&self, user_id: UserId) -> Result<bool, ContestError> {
        let profile = repository::require_profile(self.identity.as_ref(), user_id).await?;
        Ok(profile.verified)
    }

    /// Charge the payment method and credit the wallet
    ///
    /// If the provider captured the money but the credit cannot be written,
    /// the capture is refunded through the provider.
    pub async fn deposit(
        &self,
        user_id: UserId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<DepositReceipt, ContestError> {
        if amount < self.limits.min_deposit {
            return Err(ContestError::AmountTooSmall { amount, min: self.limits.min_deposit });
        }
        if amount > self.limits.max_deposit {
            return Err(ContestError::AmountTooLarge { amount, max: self.limits.max_deposit });
        }

        let verified = self.is_verified(user_id).await?;
        if amount > self.limits.verification_threshold && !verified {
            return Err(ContestError::VerificationRequired {
                action: format!("deposit more than {}", self.limits.verification_threshold),
            });
        }

        let receipt = self.gateway.authorize_deposit(user_id, amount, method).await.map_err(|e| {
            metrics::increment_counter!("payment_gateway_failures_total", "operation" => "deposit");
            tracing::warn!("Deposit of {} for user {} not captured: {}", amount, user_id, e);
            ContestError::from(e)
        })?;

        let credit = Delta::credit(amount, TransactionKind::Deposit).with_metadata(serde_json::json!({
            "payment_method": method,
            "payment_reference": receipt.reference,
            "deposit_source": "user_initiated",
        }));

        let tx = match self.ledger.apply_delta(user_id, credit).await {
            Ok(tx) => tx,
            Err(credit_err) => {
                tracing::warn!(
                    "Captured deposit {} for user {} could not be credited, refunding: {}",
                    receipt.reference,
                    user_id,
                    credit_err
                );
                if let Err(refund_err) = self.gateway.refund_deposit(&receipt).await {
                    metrics::increment_counter!("compensation_failures_total", "operation" => "deposit");
                    tracing::error!(
                        "Deposit {} of {} for user {} was captured but neither credited nor refunded: {}",
                        receipt.reference,
                        amount,
                        user_id,
                        refund_err
                    );
                    return Err(ContestError::CompensationFailed {
                        operation: "deposit",
                        user_id,
                        amount,
                        reason: refund_err.to_string(),
                    });
                }
                return Err(credit_err.into());
            }
        };

        metrics::increment_counter!("deposits_total", "method" => method.as_str());
        tracing::info!("User {} deposited {} via {}", user_id, amount, method);

        Ok(DepositReceipt {
            amount,
            new_balance: tx.balance_after,
            transaction_id: tx.id,
            payment_reference: receipt.reference,
            timestamp: tx.created_at,
        })
    }

    /// Debit the amount plus fee and start the payout
    ///
    /// The withdrawal line stays pending until the provider reports back
    /// through [`WalletFundingService::confirm_payout`].
    pub async fn withdraw(
        &self,
        user_id: UserId,
        amount: Money,
        method: PaymentMethod,
        details: &PayoutDetails,
    ) -> Result<WithdrawalReceipt, ContestError> {
        if amount < self.limits.min_withdrawal {
            return Err(ContestError::AmountTooSmall { amount, min: self.limits.min_withdrawal });
        }
        if !self.is_verified(user_id).await? {
            return Err(ContestError::VerificationRequired { action: "withdraw funds".to_string() });
        }
        let destination = PayoutDestination::from_details(method, details)?;

        let fee = self.limits.withdrawal_fee(amount);
        let total = amount.checked_add(fee).ok_or(ContestError::AmountTooLarge {
            amount,
            max: Money::from_cents(i64::MAX) - fee,
        })?;

        let lines = self
            .ledger
            .apply_deltas(
                user_id,
                vec![
                    Delta::debit(amount, TransactionKind::Withdrawal).pending().with_metadata(
                        serde_json::json!({
                            "withdrawal_method": method,
                            "destination": destination.masked(),
                            "fee_amount": fee,
                            "net_amount": amount,
                        }),
                    ),
                    Delta::debit(fee, TransactionKind::Fee).with_metadata(serde_json::json!({
                        "withdrawal_method": method,
                        "fee_for": "withdrawal",
                    })),
                ],
            )
            .await?;
        let (withdrawal, fee_line) = match lines.as_slice() {
            [withdrawal, fee_line] => (withdrawal.clone(), fee_line.clone()),
            _ => {
                return Err(ContestError::Storage(format!(
                    "withdrawal committed {} lines instead of 2",
                    lines.len()
                )))
            }
        };

        let handle = match self.gateway.initiate_payout(user_id, amount, &destination).await {
            Ok(handle) => handle,
            Err(gateway_err) => {
                metrics::increment_counter!("payment_gateway_failures_total", "operation" => "withdrawal");
                tracing::warn!(
                    "Payout of {} for user {} not started, reversing withdrawal {}: {}",
                    amount,
                    user_id,
                    withdrawal.id,
                    gateway_err
                );
                self.reverse_withdrawal(&withdrawal, total, "withdrawal").await?;
                return Err(gateway_err.into());
            }
        };

        metrics::increment_counter!("withdrawals_total", "method" => method.as_str());
        tracing::info!(
            "User {} withdrew {} (+{} fee) to {}, payout {}",
            user_id,
            amount,
            fee,
            destination.masked(),
            handle.reference
        );

        Ok(WithdrawalReceipt {
            amount,
            fee,
            total,
            new_balance: fee_line.balance_after,
            status: withdrawal.status,
            transaction_id: withdrawal.id,
            fee_transaction_id: fee_line.id,
            payout_reference: handle.reference,
            estimated_processing_time: PROCESSING_TIME,
        })
    }

    /// Resolve a pending withdrawal once the provider reports the outcome
    ///
    /// A failed payout returns the amount and its fee to the wallet.
    pub async fn confirm_payout(
        &self,
        transaction_id: TransactionId,
        succeeded: bool,
    ) -> Result<PayoutResolution, ContestError> {
        let withdrawal = self.ledger.transaction(transaction_id).await?;
        if withdrawal.kind != TransactionKind::Withdrawal {
            return Err(ContestError::NotAWithdrawal { transaction_id });
        }

        if succeeded {
            let settled =
                self.ledger.settle_pending(transaction_id, TransactionStatus::Completed).await?;
            tracing::info!("Payout for withdrawal {} completed", transaction_id);
            return Ok(PayoutResolution {
                transaction_id,
                status: settled.status,
                refunded: None,
                new_balance: self.ledger.balance(settled.user_id).await?,
            });
        }

        let fee = withdrawal
            .metadata
            .get("fee_amount")
            .and_then(serde_json::Value::as_i64)
            .map(Money::from_cents)
            .unwrap_or(Money::ZERO);
        let total = -withdrawal.amount + fee;
        let new_balance = self.reverse_withdrawal(&withdrawal, total, "payout").await?;

        Ok(PayoutResolution {
            transaction_id,
            status: TransactionStatus::Failed,
            refunded: Some(total),
            new_balance,
        })
    }

    /// Mark a withdrawal failed and refund `total` to its wallet
    async fn reverse_withdrawal(
        &self,
        withdrawal: &Transaction,
        total: Money,
        operation: &'static str,
    ) -> Result<Money, ContestError> {
        let user_id = withdrawal.user_id;
        self.ledger.settle_pending(withdrawal.id, TransactionStatus::Failed).await?;

        let refund = Delta::credit(total, TransactionKind::Refund).with_metadata(serde_json::json!({
            "reverses": withdrawal.id,
            "reason": "payout_failed",
        }));

        match self.ledger.apply_delta(user_id, refund).await {
            Ok(tx) => {
                tracing::info!("Refunded {} to user {} for failed {}", total, user_id, operation);
                Ok(tx.balance_after)
            }
            Err(refund_err) => {
                metrics::increment_counter!("compensation_failures_total", "operation" => operation);
                tracing::error!(
                    "Withdrawal {} failed and {} could not be refunded to user {}: {}",
                    withdrawal.id,
                    total,
                    user_id,
                    refund_err
                );
                Err(ContestError::CompensationFailed {
                    operation,
                    user_id,
                    amount: total,
                    reason: refund_err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Harness;
    use crate::memory::FailPoint;

    fn bank() -> PayoutDetails {
        PayoutDetails {
            bank_account: Some("000123456789".to_string()),
            routing_number: Some("021000021".to_string()),
            paypal_email: None,
        }
    }

    #[tokio::test]
    async fn test_deposit_credits_wallet() {
        let h = Harness::new().await;
        let user = h.verified_user(Money::ZERO).await;

        let receipt =
            h.funding().deposit(user, Money::from_dollars(100), PaymentMethod::Card).await.unwrap();

        assert_eq!(receipt.new_balance, Money::from_dollars(100));
        let tx = h.ledger.transaction(receipt.transaction_id).await.unwrap();
        assert_eq!(tx.kind, TransactionKind::Deposit);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.metadata["payment_reference"], receipt.payment_reference.as_str());
    }

    #[tokio::test]
    async fn test_deposit_limits() {
        let h = Harness::new().await;
        let user = h.verified_user(Money::ZERO).await;
        let funding = h.funding();

        let err = funding.deposit(user, Money::from_cents(999), PaymentMethod::Card).await.unwrap_err();
        assert!(matches!(err, ContestError::AmountTooSmall { .. }));

        let err = funding
            .deposit(user, Money::from_cents(1_000_001), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err, ContestError::AmountTooLarge { .. }));

        assert!(funding.deposit(user, Money::from_dollars(10), PaymentMethod::Card).await.is_ok());
        assert!(funding.deposit(user, Money::from_dollars(10_000), PaymentMethod::Card).await.is_ok());
        assert_eq!(h.gateway.captured_count(), 2);
    }

    #[tokio::test]
    async fn test_large_deposit_requires_verification() {
        let h = Harness::new().await;
        let user = h.unverified_user(Money::ZERO).await;
        let funding = h.funding();

        let err = funding.deposit(user, Money::from_cents(50_001), PaymentMethod::Card).await.unwrap_err();
        assert!(matches!(err, ContestError::VerificationRequired { .. }));
        assert_eq!(h.gateway.captured_count(), 0);

        let ok = funding.deposit(user, Money::from_dollars(500), PaymentMethod::Card).await.unwrap();
        assert_eq!(ok.new_balance, Money::from_dollars(500));
    }

    #[tokio::test]
    async fn test_declined_deposit_changes_nothing() {
        let h = Harness::new().await;
        let user = h.verified_user(Money::ZERO).await;
        h.gateway.decline_user(user);

        let err =
            h.funding().deposit(user, Money::from_dollars(50), PaymentMethod::Card).await.unwrap_err();

        assert!(matches!(err, ContestError::PaymentDeclined { .. }));
        assert!(h.ledger.transactions(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_uncredited_deposit_is_refunded_by_provider() {
        let h = Harness::new().await;
        let user = h.verified_user(Money::ZERO).await;
        h.wallets.reject_kind(TransactionKind::Deposit);

        let err =
            h.funding().deposit(user, Money::from_dollars(50), PaymentMethod::Card).await.unwrap_err();

        assert!(!err.is_fatal());
        assert_eq!(h.ledger.balance(user).await.unwrap(), Money::ZERO);
    }

    #[tokio::test]
    async fn test_uncredited_and_unrefunded_deposit_is_fatal() {
        let h = Harness::new().await;
        let user = h.verified_user(Money::ZERO).await;
        h.wallets.reject_kind(TransactionKind::Deposit);
        h.gateway.set_refunds_offline(true);

        let err =
            h.funding().deposit(user, Money::from_dollars(50), PaymentMethod::Card).await.unwrap_err();
        assert!(matches!(err, ContestError::CompensationFailed { operation: "deposit", .. }));
    }

    #[tokio::test]
    async fn test_withdrawal_debits_amount_and_fee() {
        let h = Harness::new().await;
        let user = h.verified_user(Money::from_dollars(200)).await;

        let receipt = h
            .funding()
            .withdraw(user, Money::from_dollars(100), PaymentMethod::BankTransfer, &bank())
            .await
            .unwrap();

        assert_eq!(receipt.fee, Money::from_dollars(2));
        assert_eq!(receipt.total, Money::from_dollars(102));
        assert_eq!(receipt.new_balance, Money::from_dollars(98));
        assert_eq!(receipt.status, TransactionStatus::Pending);

        let fee = h.ledger.transaction(receipt.fee_transaction_id).await.unwrap();
        assert_eq!(fee.kind, TransactionKind::Fee);
        assert_eq!(fee.status, TransactionStatus::Completed);
        let withdrawal = h.ledger.transaction(receipt.transaction_id).await.unwrap();
        assert_eq!(withdrawal.metadata["destination"], "bank ****6789");
    }

    #[tokio::test]
    async fn test_withdrawal_rules() {
        let h = Harness::new().await;
        let verified = h.verified_user(Money::from_dollars(200)).await;
        let unverified = h.unverified_user(Money::from_dollars(200)).await;
        let funding = h.funding();

        let err = funding
            .withdraw(verified, Money::from_dollars(20), PaymentMethod::BankTransfer, &bank())
            .await
            .unwrap_err();
        assert!(matches!(err, ContestError::AmountTooSmall { .. }));

        let err = funding
            .withdraw(unverified, Money::from_dollars(50), PaymentMethod::BankTransfer, &bank())
            .await
            .unwrap_err();
        assert!(matches!(err, ContestError::VerificationRequired { .. }));

        let err = funding
            .withdraw(verified, Money::from_dollars(50), PaymentMethod::PayPal, &bank())
            .await
            .unwrap_err();
        assert!(matches!(err, ContestError::MissingPayoutDetails { .. }));

        let err = funding
            .withdraw(verified, Money::from_dollars(199), PaymentMethod::BankTransfer, &bank())
            .await
            .unwrap_err();
        assert!(matches!(err, ContestError::InsufficientFunds { .. }));
        assert_eq!(h.ledger.balance(verified).await.unwrap(), Money::from_dollars(200));
    }

    #[tokio::test]
    async fn test_withdrawal_total_past_i64_is_rejected() {
        let h = Harness::new().await;
        let user = h.verified_user(Money::from_dollars(200)).await;

        let err = h
            .funding()
            .withdraw(user, Money::from_cents(i64::MAX - 100), PaymentMethod::BankTransfer, &bank())
            .await
            .unwrap_err();

        assert!(matches!(err, ContestError::AmountTooLarge { .. }));
        assert_eq!(err.code(), "INVALID_AMOUNT");
        assert_eq!(h.ledger.balance(user).await.unwrap(), Money::from_dollars(200));
        assert_eq!(h.ledger.transactions(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_payout_start_is_reversed() {
        let h = Harness::new().await;
        let user = h.verified_user(Money::from_dollars(200)).await;
        h.gateway.set_offline(true);

        let err = h
            .funding()
            .withdraw(user, Money::from_dollars(100), PaymentMethod::BankTransfer, &bank())
            .await
            .unwrap_err();

        assert!(matches!(err, ContestError::GatewayUnavailable { .. }));
        assert_eq!(h.ledger.balance(user).await.unwrap(), Money::from_dollars(200));

        let log = h.ledger.transactions(user).await.unwrap();
        let withdrawal = log.iter().find(|tx| tx.kind == TransactionKind::Withdrawal).unwrap();
        assert_eq!(withdrawal.status, TransactionStatus::Failed);
        assert_eq!(log.last().unwrap().kind, TransactionKind::Refund);
        assert_eq!(log.last().unwrap().amount, Money::from_dollars(102));
    }

    #[tokio::test]
    async fn test_confirm_payout() {
        let h = Harness::new().await;
        let user = h.verified_user(Money::from_dollars(300)).await;
        let funding = h.funding();

        let ok = funding
            .withdraw(user, Money::from_dollars(100), PaymentMethod::BankTransfer, &bank())
            .await
            .unwrap();
        let resolved = funding.confirm_payout(ok.transaction_id, true).await.unwrap();
        assert_eq!(resolved.status, TransactionStatus::Completed);
        assert_eq!(resolved.new_balance, Money::from_dollars(198));

        let again = funding.confirm_payout(ok.transaction_id, false).await.unwrap_err();
        assert!(matches!(again, ContestError::PayoutAlreadyResolved { .. }));

        let bounced = funding
            .withdraw(user, Money::from_dollars(50), PaymentMethod::BankTransfer, &bank())
            .await
            .unwrap();
        assert_eq!(bounced.new_balance, Money::from_dollars(146));
        let resolved = funding.confirm_payout(bounced.transaction_id, false).await.unwrap();
        assert_eq!(resolved.refunded, Some(Money::from_dollars(52)));
        assert_eq!(resolved.new_balance, Money::from_dollars(198));
    }

    #[tokio::test]
    async fn test_confirm_rejects_other_transactions() {
        let h = Harness::new().await;
        let user = h.verified_user(Money::ZERO).await;
        let deposit =
            h.funding().deposit(user, Money::from_dollars(50), PaymentMethod::Card).await.unwrap();

        let err = h.funding().confirm_payout(deposit.transaction_id, true).await.unwrap_err();
        assert!(matches!(err, ContestError::NotAWithdrawal { .. }));
    }

    #[tokio::test]
    async fn test_identity_outage_is_an_external_failure() {
        let h = Harness::new().await;
        h.catalog.fail_on(FailPoint::Profile);
        let user = h.verified_user(Money::ZERO).await;

        let err =
            h.funding().deposit(user, Money::from_dollars(50), PaymentMethod::Card).await.unwrap_err();
        assert!(matches!(err, ContestError::IdentityUnavailable { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::ExternalDependency);
        assert_eq!(h.gateway.captured_count(), 0);
    }
}
