//! Session Provider port and its password-based implementation.

use std::sync::Arc;

use async_trait::async_trait;
use validator::Validate;

use crate::auth::jwt::{
    create_confirmation_token, create_session_token, hash_token, verify_token, TokenType,
};
use crate::auth::password::{hash_password, verify_password};
use crate::config::Config;
use crate::error::{AppError, AppResult, AuthError};
use crate::models::account::{Account, Credentials, NewAccount, Session, SessionUser, SignUpOutcome};
use crate::store::{AccountStore, StoreError};

pub const CONFIRMATION_MESSAGE: &str = "Account created. Check your email to confirm your account.";

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The user behind `token`, or `None` when it is invalid, expired or signed out.
    async fn current_user(&self, token: &str) -> AppResult<Option<SessionUser>>;

    async fn sign_up(&self, credentials: &Credentials) -> AppResult<SignUpOutcome>;

    async fn sign_in(&self, credentials: &Credentials) -> AppResult<Session>;

    async fn sign_out(&self, token: &str) -> AppResult<()>;

    /// Completes a pending sign-up and signs the user in.
    async fn confirm_email(&self, confirmation_token: &str) -> AppResult<Session>;
}

pub struct PasswordSessionProvider {
    accounts: Arc<dyn AccountStore>,
    config: Arc<Config>,
}

impl PasswordSessionProvider {
    pub fn new(accounts: Arc<dyn AccountStore>, config: Arc<Config>) -> Self {
        Self { accounts, config }
    }

    fn issue_session(&self, account: &Account) -> AppResult<Session> {
        let access_token = create_session_token(account.id, &account.email, &self.config)?;
        Ok(Session {
            access_token,
            expires_in: self.config.session_ttl_secs,
            user: SessionUser {
                id: account.id,
                email: account.email.clone(),
            },
        })
    }
}

#[async_trait]
impl SessionProvider for PasswordSessionProvider {
    async fn current_user(&self, token: &str) -> AppResult<Option<SessionUser>> {
        let claims = match verify_token(token, TokenType::Session, &self.config) {
            Ok(claims) => claims,
            Err(_) => return Ok(None),
        };

        if self.accounts.is_session_revoked(&hash_token(token)).await? {
            return Ok(None);
        }

        Ok(Some(SessionUser {
            id: claims.sub,
            email: claims.email,
        }))
    }

    async fn sign_up(&self, credentials: &Credentials) -> AppResult<SignUpOutcome> {
        credentials.validate()?;
        let email = credentials.normalized_email();
        let password_hash = hash_password(&credentials.password)?;
        let confirmed = !self.config.require_email_confirmation;

        let account = self
            .accounts
            .insert_account(NewAccount {
                email,
                password_hash,
                confirmed,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AppError::Auth(AuthError::EmailTaken),
                other => other.into(),
            })?;

        if account.confirmed {
            tracing::info!(user_id = %account.id, "Account created and signed in");
            return Ok(SignUpOutcome::SignedIn {
                session: self.issue_session(&account)?,
            });
        }

        let confirmation_token = create_confirmation_token(account.id, &account.email, &self.config)?;
        // No mail transport: the confirmation link is logged for the operator.
        tracing::info!(
            user_id = %account.id,
            email = %account.email,
            confirm_url = %self.config.confirmation_url(&confirmation_token),
            "Account created, confirmation pending"
        );

        Ok(SignUpOutcome::ConfirmationRequired {
            email: account.email,
            message: CONFIRMATION_MESSAGE.into(),
            confirmation_token,
        })
    }

    async fn sign_in(&self, credentials: &Credentials) -> AppResult<Session> {
        let account = self
            .accounts
            .find_account_by_email(&credentials.normalized_email())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&credentials.password, &account.password_hash)? {
            return Err(AuthError::InvalidCredentials.into());
        }
        if !account.confirmed {
            return Err(AuthError::EmailNotConfirmed.into());
        }

        tracing::info!(user_id = %account.id, "User signed in");
        self.issue_session(&account)
    }

    async fn sign_out(&self, token: &str) -> AppResult<()> {
        let claims = verify_token(token, TokenType::Session, &self.config)?;
        self.accounts
            .revoke_session(&hash_token(token), claims.expires_at())
            .await?;
        tracing::info!(user_id = %claims.sub, "User signed out");
        Ok(())
    }

    async fn confirm_email(&self, confirmation_token: &str) -> AppResult<Session> {
        let claims = verify_token(confirmation_token, TokenType::Confirmation, &self.config)?;
        let account = self
            .accounts
            .confirm_account(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        tracing::info!(user_id = %account.id, "Email confirmed");
        self.issue_session(&account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn provider(require_confirmation: bool) -> PasswordSessionProvider {
        let config = Config {
            jwt_secret: "test-secret-with-enough-length".into(),
            require_email_confirmation: require_confirmation,
            ..Config::default()
        };
        PasswordSessionProvider::new(Arc::new(MemoryStore::new()), Arc::new(config))
    }

    fn creds() -> Credentials {
        Credentials::new("User@Example.com", "hunter2hunter2")
    }

    #[tokio::test]
    async fn test_sign_up_without_confirmation_signs_in() {
        let sessions = provider(false);
        let outcome = sessions.sign_up(&creds()).await.unwrap();

        let SignUpOutcome::SignedIn { session } = outcome else {
            panic!("expected a session");
        };
        let user = sessions.current_user(&session.access_token).await.unwrap();
        assert_eq!(user.map(|u| u.email), Some("user@example.com".to_string()));
    }

    #[tokio::test]
    async fn test_sign_up_with_confirmation_is_pending() {
        let sessions = provider(true);
        let outcome = sessions.sign_up(&creds()).await.unwrap();

        let SignUpOutcome::ConfirmationRequired {
            confirmation_token,
            message,
            ..
        } = outcome
        else {
            panic!("expected confirmation to be required");
        };
        assert!(message.contains("Check your email"));

        let err = sessions.sign_in(&creds()).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::EmailNotConfirmed)));

        sessions.confirm_email(&confirmation_token).await.unwrap();
        assert!(sessions.sign_in(&creds()).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_is_email_taken() {
        let sessions = provider(false);
        sessions.sign_up(&creds()).await.unwrap();
        let err = sessions
            .sign_up(&Credentials::new("user@example.com", "another-password"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let sessions = provider(false);
        sessions.sign_up(&creds()).await.unwrap();

        let wrong = sessions
            .sign_in(&Credentials::new("user@example.com", "not-the-password"))
            .await
            .unwrap_err();
        assert!(matches!(wrong, AppError::Auth(AuthError::InvalidCredentials)));

        let unknown = sessions
            .sign_in(&Credentials::new("nobody@example.com", "hunter2hunter2"))
            .await
            .unwrap_err();
        assert!(matches!(unknown, AppError::Auth(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_invalid_sign_up_is_validation_error() {
        let sessions = provider(false);
        let err = sessions
            .sign_up(&Credentials::new("nope", "short"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_sign_out_revokes_session() {
        let sessions = provider(false);
        sessions.sign_up(&creds()).await.unwrap();
        let session = sessions.sign_in(&creds()).await.unwrap();

        sessions.sign_out(&session.access_token).await.unwrap();

        assert!(sessions
            .current_user(&session.access_token)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_garbage_token_has_no_user() {
        let sessions = provider(false);
        assert!(sessions.current_user("garbage").await.unwrap().is_none());
    }
}
