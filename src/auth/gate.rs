//! Authentication gate: Basic challenge/response and registration.
//!
//! Per request the gate moves `AwaitingCredentials → CredentialsExtracted →
//! {Verified, Rejected}`. Unknown user, wrong password and corrupt stored hash
//! all produce the same [`Challenge`]; the distinction only reaches the logs.
//! Unknown users are checked against a dummy hash so every extracted
//! credential costs one adaptive hash.

use super::basic::{parse_basic_credentials, BasicCredentials};
use super::error::{AuthError, RejectReason, StoreError};
use super::hashing::{HashingPolicy, StoredHash, Verification};
use super::store::{CredentialStore, StoredCredential, UserId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Realm used when none (or an unusable one) is configured.
pub const DEFAULT_REALM: &str = "Login required";

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

/// What a rejected caller is told to present next time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    realm: Arc<str>,
}

impl Challenge {
    pub fn new(realm: &str) -> Self {
        let cleaned: String = realm
            .chars()
            .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
            .collect();
        let cleaned = cleaned.trim();
        let realm = if cleaned.is_empty() {
            DEFAULT_REALM
        } else {
            cleaned
        };
        Self {
            realm: Arc::from(realm),
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Value for the `WWW-Authenticate` response header.
    pub fn header_value(&self) -> String {
        format!("Basic realm=\"{}\", charset=\"UTF-8\"", self.realm)
    }
}

/// Terminal state of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Verified(Identity),
    Rejected(Challenge),
}

/// Username/password pair that passed input validation.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Reject empty fields before any hashing work is spent on them.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self, AuthError> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() {
            return Err(AuthError::InvalidInput("username cannot be empty".into()));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password cannot be empty".into()));
        }
        Ok(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl From<BasicCredentials> for Credentials {
    fn from(basic: BasicCredentials) -> Self {
        Self {
            username: basic.username,
            password: basic.password,
        }
    }
}

/// Registration and verification front door over an injected store.
pub struct Gate {
    store: Arc<dyn CredentialStore>,
    policy: HashingPolicy,
    challenge: Challenge,
    hash_slots: Arc<Semaphore>,
    dummy_hash: StoredHash,
}

impl Gate {
    /// `hash_workers` bounds how many adaptive hashes run at once.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        policy: HashingPolicy,
        realm: &str,
        hash_workers: usize,
    ) -> Result<Self, AuthError> {
        let dummy_hash = policy.hash("credgate-dummy-password")?;
        Ok(Self {
            store,
            policy,
            challenge: Challenge::new(realm),
            hash_slots: Arc::new(Semaphore::new(hash_workers.max(1))),
            dummy_hash,
        })
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    /// Create a new account. Empty fields are `InvalidInput`; a taken
    /// username is `DuplicateUsername`.
    pub async fn register(&self, username: &str, password: &str) -> Result<UserId, AuthError> {
        let credentials = Credentials::new(username, password)?;
        let Credentials { username, password } = credentials;

        let hash = self
            .run_hashing(move |policy| policy.hash(&password))
            .await??;

        let name = username.clone();
        match self.run_store(move |store| store.register(&name, &hash)).await {
            Ok(user_id) => {
                tracing::info!(username = %username, user_id = %user_id, "User registered");
                Ok(user_id)
            }
            Err(AuthError::DuplicateUsername) => {
                tracing::info!(username = %username, "Registration refused: username taken");
                Err(AuthError::DuplicateUsername)
            }
            Err(e) => {
                tracing::error!(username = %username, "Registration failed: {e}");
                Err(e)
            }
        }
    }

    /// Run the Basic challenge/response for a raw `Authorization` header.
    ///
    /// Malformed or missing headers are `Rejected`; only storage and worker
    /// failures come back as `Err`.
    pub async fn authenticate(&self, header: Option<&str>) -> Result<AuthOutcome, AuthError> {
        let Some(raw) = header else {
            return Ok(self.reject(RejectReason::MissingCredentials, None));
        };

        match parse_basic_credentials(raw) {
            Ok(basic) => self.check(basic.into()).await,
            Err(e) => {
                tracing::debug!("Unreadable Authorization header: {e}");
                Ok(self.reject(RejectReason::MissingCredentials, None))
            }
        }
    }

    /// Verify a username/password pair submitted as a login form.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthOutcome, AuthError> {
        let credentials = Credentials::new(username, password)?;
        self.check(credentials).await
    }

    async fn check(&self, credentials: Credentials) -> Result<AuthOutcome, AuthError> {
        let Credentials { username, password } = credentials;

        let name = username.clone();
        let record = self.run_store(move |store| store.lookup(&name)).await?;

        if let Some(record) = &record {
            if self.policy.needs_rehash(&record.hash) {
                tracing::info!(
                    username = %username,
                    "Stored hash uses fewer rounds than the current policy"
                );
            }
        }

        let (user_id, target, verdict) = self.verification_target(record);
        let verification = self
            .run_hashing(move |policy| policy.verify(&password, &target))
            .await?;
        let verification = verdict.unwrap_or(verification);

        Ok(match (user_id, verification) {
            (Some(user_id), Verification::Match) => {
                tracing::debug!(username = %username, user_id = %user_id, "Credentials verified");
                AuthOutcome::Verified(Identity { user_id, username })
            }
            (Some(_), Verification::Corrupt) => {
                self.reject(RejectReason::CorruptCredential, Some(&username))
            }
            _ => self.reject(RejectReason::InvalidCredentials, Some(&username)),
        })
    }

    /// Pick the hash to derive against. Missing users and stored hashes that
    /// cannot be verified are swapped for the dummy hash, with the verdict
    /// decided up front, so every extracted credential costs one full hash.
    fn verification_target(
        &self,
        record: Option<StoredCredential>,
    ) -> (Option<UserId>, StoredHash, Option<Verification>) {
        match record {
            Some(record) => match self.policy.unusable_verdict(&record.hash) {
                None => (Some(record.id), record.hash, None),
                verdict => (Some(record.id), self.dummy_hash.clone(), verdict),
            },
            None => (None, self.dummy_hash.clone(), None),
        }
    }

    fn reject(&self, reason: RejectReason, username: Option<&str>) -> AuthOutcome {
        match reason {
            RejectReason::CorruptCredential => tracing::warn!(
                username = username.unwrap_or(""),
                reason = %reason,
                "Stored credential is corrupt; rejecting"
            ),
            _ => tracing::debug!(
                username = username.unwrap_or(""),
                reason = %reason,
                "Authentication rejected"
            ),
        }
        AuthOutcome::Rejected(self.challenge.clone())
    }

    /// Run CPU-heavy hashing on the blocking pool, at most `hash_workers` at a time.
    async fn run_hashing<T, F>(&self, work: F) -> Result<T, AuthError>
    where
        F: FnOnce(HashingPolicy) -> T + Send + 'static,
        T: Send + 'static,
    {
        // The permit travels with the job: a cancelled caller must not free
        // the slot while the hash is still running.
        let permit = Arc::clone(&self.hash_slots)
            .acquire_owned()
            .await
            .map_err(|_| AuthError::Hashing("hashing pool closed".into()))?;
        let policy = self.policy;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work(policy)
        })
        .await
        .map_err(|e| AuthError::Hashing(format!("hashing worker failed: {e}")))
    }

    async fn run_store<T, F>(&self, work: F) -> Result<T, AuthError>
    where
        F: FnOnce(&dyn CredentialStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || work(store.as_ref()))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("storage worker failed: {e}")))?;
        result.map_err(AuthError::from)
    }
}
