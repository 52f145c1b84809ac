use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    generators::{IdentityGenerator, RandomIdentityGenerator},
    models::User,
};
use crate::shared::AppError;
use crate::storage::GameStore;

/// Collisions tolerated before registration gives up
const MAX_CODE_ATTEMPTS: usize = 5;

/// Registration and lookup of players
pub struct UserService {
    store: Arc<dyn GameStore>,
    identity: Arc<dyn IdentityGenerator>,
}

impl UserService {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self::with_generator(store, Arc::new(RandomIdentityGenerator::new()))
    }

    pub fn with_generator(store: Arc<dyn GameStore>, identity: Arc<dyn IdentityGenerator>) -> Self {
        Self { store, identity }
    }

    /// Returns the known user or creates one on first contact
    #[instrument(skip(self))]
    pub async fn register(
        &self,
        user_id: i64,
        display_name: &str,
        referral_code: Option<&str>,
    ) -> Result<User, AppError> {
        if let Some(existing) = self.store.get_user(user_id).await? {
            debug!(user_id = %user_id, "User already registered");
            return Ok(existing);
        }

        let name = match display_name.trim() {
            "" => self.identity.display_name().await,
            trimmed => trimmed.to_string(),
        };

        let mut user = User::new(user_id, name, self.unique_referral_code().await?);
        user.referred_by = self.resolve_referrer(user_id, referral_code).await;

        self.store.create_user(&user).await?;
        info!(
            user_id = %user_id,
            referral_code = %user.referral_code,
            referred_by = ?user.referred_by,
            "Registered new user"
        );
        Ok(user)
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User, AppError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    async fn unique_referral_code(&self) -> Result<String, AppError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.identity.referral_code().await;
            if self.store.get_user_by_referral_code(&code).await?.is_none() {
                return Ok(code);
            }
            warn!(code = %code, "Referral code collision, regenerating");
        }
        Err(AppError::Internal)
    }

    /// A referral only counts when it points at a different existing user
    async fn resolve_referrer(&self, user_id: i64, code: Option<&str>) -> Option<String> {
        let code = code.map(str::trim).filter(|c| !c.is_empty())?;
        match self.store.get_user_by_referral_code(code).await {
            Ok(Some(referrer)) if referrer.id != user_id => Some(code.to_string()),
            Ok(_) => {
                debug!(code = %code, "Ignoring unknown referral code");
                None
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Failed to resolve referral code");
                None
            }
        }
    }
}
