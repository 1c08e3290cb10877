/// Email/password authentication backed by the document store
///
/// Collections:
/// - `accounts/{lower-cased email}`: uid + Argon2id hash, created atomically so
///   two sign-ups for the same email cannot both succeed
/// - `users/{uid}`: public profile (display name, email, photo)
/// - `revoked_tokens/{jti}`: tokens invalidated by sign-out
///
/// Session tokens are HS256 JWTs naming only the user and the token id. The
/// profile is read from `users/{uid}` on verify, since photo URLs may be
/// inline `data:` URLs far larger than a request header allows.
use super::password::{hash_password, verify_password};
use super::{AuthError, AuthProvider, Session, SignInRequest, SignUpRequest};
use crate::models::UserIdentity;
use crate::store::{encode, Document, DocumentStore, StoreError};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode as encode_jwt, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const ACCOUNTS: &str = "accounts";
const USERS: &str = "users";
const REVOKED_TOKENS: &str = "revoked_tokens";

/// JWT claims for a session token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Token id, used for revocation
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    uid: String,
    password_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    display_name: String,
    email: String,
    #[serde(default)]
    photo_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevokedTokenRecord {
    uid: String,
    revoked_at: i64,
}

pub struct LocalAuthProvider {
    store: Arc<dyn DocumentStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl LocalAuthProvider {
    pub fn new(store: Arc<dyn DocumentStore>, secret: &str, ttl: Duration) -> Self {
        Self {
            store,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    fn issue(&self, user: UserIdentity) -> Result<Session, AuthError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user.uid.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode_jwt(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Token signing failed: {}", e)))?;

        Ok(Session {
            token,
            user,
            expires_at,
        })
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    async fn load_profile(&self, uid: &str) -> Result<Option<UserIdentity>, AuthError> {
        let Some(snapshot) = self.store.get(USERS, uid).await? else {
            return Ok(None);
        };
        let profile = snapshot.decode::<UserRecord>()?;
        Ok(Some(UserIdentity {
            uid: uid.to_string(),
            display_name: profile.display_name,
            email: profile.email,
            photo_url: profile.photo_url,
        }))
    }
}

fn account_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_in(&self, credentials: SignInRequest) -> Result<Session, AuthError> {
        credentials.check()?;

        let account = self
            .store
            .get(ACCOUNTS, &account_key(&credentials.email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?
            .decode::<AccountRecord>()?;

        if !verify_password(&credentials.password, &account.password_hash)? {
            tracing::info!(uid = %account.uid, "sign-in rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let user = self
            .load_profile(&account.uid)
            .await?
            .ok_or_else(|| AuthError::Internal(format!("profile missing for {}", account.uid)))?;

        tracing::info!(uid = %account.uid, "user signed in");
        self.issue(user)
    }

    async fn sign_up(&self, profile: SignUpRequest) -> Result<Session, AuthError> {
        profile.check()?;

        let uid = Uuid::new_v4().to_string();
        let account = encode(&AccountRecord {
            uid: uid.clone(),
            password_hash: hash_password(&profile.password)?,
        })?;

        let user = UserIdentity {
            uid: uid.clone(),
            display_name: profile.display_name.trim().to_string(),
            email: profile.email.trim().to_string(),
            photo_url: Some(profile.photo_url),
        };
        let record = encode(&UserRecord {
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            photo_url: user.photo_url.clone(),
        })?;

        let key = account_key(&profile.email);
        let created = self
            .store
            .modify(
                ACCOUNTS,
                &key,
                Box::new(move |current: Option<Document>| match current {
                    Some(_) => Err(StoreError::Precondition("email already registered".into())),
                    None => Ok(account),
                }),
            )
            .await;
        match created {
            Ok(_) => {}
            Err(StoreError::Precondition(_)) => return Err(AuthError::EmailAlreadyExists),
            Err(e) => return Err(e.into()),
        }

        // An account without a profile can neither sign in nor sign up again.
        if let Err(err) = self.store.set(USERS, &uid, record).await {
            tracing::error!(%uid, "profile write failed: {}", err);
            if let Err(cleanup) = self.store.delete(ACCOUNTS, &key).await {
                tracing::error!(%uid, "failed to release account after sign-up error: {}", cleanup);
            }
            return Err(err.into());
        }

        tracing::info!(%uid, "account created");
        self.issue(user)
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.decode_claims(token)?;
        self.store
            .set(
                REVOKED_TOKENS,
                &claims.jti,
                encode(&RevokedTokenRecord {
                    uid: claims.sub.clone(),
                    revoked_at: Utc::now().timestamp(),
                })?,
            )
            .await?;

        tracing::info!(uid = %claims.sub, "user signed out");
        Ok(())
    }

    async fn verify(&self, token: &str) -> Result<UserIdentity, AuthError> {
        let claims = self.decode_claims(token)?;

        if self.store.get(REVOKED_TOKENS, &claims.jti).await?.is_some() {
            return Err(AuthError::TokenRevoked);
        }

        self.load_profile(&claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)
    }
}
