
use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::backend::{
    BackendError, DataStore, NewUser, PointsDeduction, ReferralOutcome, ReferralRecord,
    UserRecord,
};

/// Represents errors that can occur while managing user accounts.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The referral code was blank after trimming.
    #[error("Referral code must not be empty")]
    EmptyReferralCode,

    /// The backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

type Result<T> = std::result::Result<T, AccountError>;

/// Represents the account operations: registration, point charging and
/// referrals.
#[automock]
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Returns the existing user for this Telegram id, registering one when
    /// absent.
    async fn ensure_user(&self, user: NewUser) -> Result<UserRecord>;

    /// Charges one request point, premium balance first.
    async fn spend_point(&self, telegram_id: i64) -> Result<PointsDeduction>;

    /// Credits a referral code to a newly registered user. The code is
    /// trimmed and rejected locally when blank, before any backend call.
    async fn apply_referral(&self, new_user_id: i64, code: &str) -> Result<ReferralOutcome>;

    /// Lists the referrals credited to a user.
    async fn referrals_of(&self, referrer_id: i64) -> Result<Vec<ReferralRecord>>;
}

/// [`AccountService`] backed by a [`DataStore`].
pub struct DefaultAccountService {
    store: Arc<dyn DataStore>,
}

impl DefaultAccountService {
    /// Creates a new service on top of `store`.
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AccountService for DefaultAccountService {
    #[instrument(skip(self, user), fields(telegram_id = user.telegram_id))]
    async fn ensure_user(&self, user: NewUser) -> Result<UserRecord> {
        if let Some(existing) = self.store.user_by_telegram_id(user.telegram_id).await? {
            debug!("User {} already registered", user.telegram_id);
            return Ok(existing);
        }
        let created = self.store.create_user(user).await?;
        info!("Registered new user {}", created.telegram_id);
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn spend_point(&self, telegram_id: i64) -> Result<PointsDeduction> {
        let deduction = self.store.deduct_point(telegram_id).await?;
        if !deduction.allowed {
            debug!("User {telegram_id} has no points left");
        }
        Ok(deduction)
    }

    #[instrument(skip(self, code))]
    async fn apply_referral(&self, new_user_id: i64, code: &str) -> Result<ReferralOutcome> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AccountError::EmptyReferralCode);
        }
        let outcome = self.store.process_referral(new_user_id, code.to_owned()).await?;
        if outcome.success {
            info!("Referral credited for user {new_user_id}");
        }
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn referrals_of(&self, referrer_id: i64) -> Result<Vec<ReferralRecord>> {
        Ok(self.store.referrals_of(referrer_id).await?)
    }
}
