use redis::AsyncCommands;

/// Failed attempts allowed inside one window before a client is locked out.
const MAX_FAILED_ATTEMPTS: i64 = 5;

/// Window length in seconds. Keys expire on their own, so a locked-out
/// client is unlocked by Redis TTL with no cleanup job.
const LOCKOUT_WINDOW_SECONDS: usize = 900;

/// Failed-admin-auth tracker backed by Redis, keyed by a caller identifier
/// (client IP). Lives outside the process so it survives restarts and is
/// shared across server instances. Keys carry the configured namespace so
/// instances with different prefixes track their counters independently.
#[derive(Clone)]
pub struct LockoutStore {
    redis_client: redis::Client,
    key_prefix: String,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to reach the lockout store")]
pub struct LockoutStoreError(#[from] redis::RedisError);

impl LockoutStore {
    pub fn new(redis_client: redis::Client, key_prefix: String) -> LockoutStore {
        LockoutStore {
            redis_client,
            key_prefix,
        }
    }

    pub async fn is_locked_out(&self, identifier: &str) -> Result<bool, LockoutStoreError> {
        let mut conn = self.redis_client.get_tokio_connection().await?;
        let attempts: Option<i64> = conn.get(self.key(identifier)).await?;

        Ok(attempts.unwrap_or(0) >= MAX_FAILED_ATTEMPTS)
    }

    /// Increments the failure counter and refreshes the expiry window.
    pub async fn register_failure(&self, identifier: &str) -> Result<(), LockoutStoreError> {
        let mut conn = self.redis_client.get_tokio_connection().await?;
        let key = self.key(identifier);

        let _: i64 = conn.incr(&key, 1).await?;
        let _: bool = conn.expire(&key, LOCKOUT_WINDOW_SECONDS).await?;

        Ok(())
    }

    /// A successful authentication clears the slate for that client.
    pub async fn clear(&self, identifier: &str) -> Result<(), LockoutStoreError> {
        let mut conn = self.redis_client.get_tokio_connection().await?;
        let _: i64 = conn.del(self.key(identifier)).await?;

        Ok(())
    }

    fn key(&self, identifier: &str) -> String {
        format!("{}:admin_lockout:{}", self.key_prefix, identifier)
    }
}
