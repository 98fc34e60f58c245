#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;

use eyre::{Context, Result};

use super::{ACCESS_TOKEN_KEY, ArcStore, TOKEN_TYPE_KEY, USER_INFO_KEY};
use crate::models::{Token, User};

/// Access token and cached profile of the signed-in user.
pub struct Credentials {
    store: ArcStore,
}

impl Credentials {
    pub fn new(store: ArcStore) -> Self {
        Self { store }
    }

    pub async fn save_token(&self, token: &Token) -> Result<()> {
        self.store
            .set(ACCESS_TOKEN_KEY, &token.access_token)
            .await?;
        self.store.set(TOKEN_TYPE_KEY, &token.token_type).await?;
        Ok(())
    }

    pub async fn token(&self) -> Result<Option<Token>> {
        let Some(access_token) = self.store.get(ACCESS_TOKEN_KEY).await? else {
            return Ok(None);
        };
        if access_token.is_empty() {
            return Ok(None);
        }
        let token_type = self
            .store
            .get(TOKEN_TYPE_KEY)
            .await?
            .unwrap_or_else(|| "bearer".to_string());
        Ok(Some(Token::new(access_token, token_type)))
    }

    pub async fn cache_user(&self, user: &User) -> Result<()> {
        let raw = serde_json::to_string(user).wrap_err("serializing user")?;
        self.store.set(USER_INFO_KEY, &raw).await
    }

    pub async fn cached_user(&self) -> Result<Option<User>> {
        let Some(raw) = self.store.get(USER_INFO_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(err) => {
                log::warn!("discarding unreadable user info: {}", err);
                Ok(None)
            }
        }
    }

    /// Forget the token and the cached user.
    pub async fn clear(&self) -> Result<()> {
        self.store.remove(ACCESS_TOKEN_KEY).await?;
        self.store.remove(TOKEN_TYPE_KEY).await?;
        self.store.remove(USER_INFO_KEY).await?;
        Ok(())
    }
}
