//! Valkey (Redis-compatible) store for poll checkpoints and post threads.
//!
//! Data model:
//!   checkpoint:{source_key} → JSON Checkpoint
//!   thread:{entity_key}     → JSON ThreadState
//!
//! All keys are namespaced under a configurable prefix so multiple bot
//! deployments can share one Valkey without collisions. Each source's
//! loop owns its checkpoint key exclusively, so plain upserts are safe.

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Last fully-processed block for a watched source. Monotonically
/// non-decreasing; advanced only after a whole window succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub source_key: String,
    pub last_processed_block: u64,
}

/// Reply-chain continuation for one tracked entity's posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadState {
    pub entity_key: String,
    pub last_action_handle: String,
}

/// The next checkpoint value: never move backwards.
pub fn advance(current: Option<u64>, next: u64) -> u64 {
    current.map_or(next, |c| c.max(next))
}

/// Persistence seam for checkpoints and thread state.
pub trait StateStore: Send {
    async fn checkpoint(&mut self, source_key: &str) -> anyhow::Result<Option<u64>>;

    async fn set_checkpoint(&mut self, source_key: &str, block: u64) -> anyhow::Result<()>;

    async fn thread_handle(&mut self, entity_key: &str) -> anyhow::Result<Option<String>>;

    async fn set_thread_handle(&mut self, entity_key: &str, handle: &str) -> anyhow::Result<()>;
}

/// Valkey-backed store.
#[derive(Clone)]
pub struct ValkeyStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl ValkeyStore {
    pub async fn connect(url: &str, prefix: &str) -> anyhow::Result<Self> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(url = url, prefix = prefix, "connected to Valkey");
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.prefix, suffix)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &mut self,
        key: &str,
    ) -> anyhow::Result<Option<T>> {
        let json: Option<String> = self.conn.get(key).await?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }
}

impl StateStore for ValkeyStore {
    async fn checkpoint(&mut self, source_key: &str) -> anyhow::Result<Option<u64>> {
        let key = self.key(&format!("checkpoint:{source_key}"));
        let doc: Option<Checkpoint> = self.get_json(&key).await?;
        Ok(doc.map(|c| c.last_processed_block))
    }

    async fn set_checkpoint(&mut self, source_key: &str, block: u64) -> anyhow::Result<()> {
        let current = self.checkpoint(source_key).await?;
        let next = advance(current, block);
        if next != block {
            warn!(
                source = source_key,
                requested = block,
                kept = next,
                "refusing to move checkpoint backwards"
            );
        }
        let key = self.key(&format!("checkpoint:{source_key}"));
        let doc = Checkpoint {
            source_key: source_key.to_string(),
            last_processed_block: next,
        };
        self.conn
            .set::<_, _, ()>(&key, serde_json::to_string(&doc)?)
            .await?;
        debug!(source = source_key, block = next, "checkpoint persisted");
        Ok(())
    }

    async fn thread_handle(&mut self, entity_key: &str) -> anyhow::Result<Option<String>> {
        let key = self.key(&format!("thread:{entity_key}"));
        let doc: Option<ThreadState> = self.get_json(&key).await?;
        Ok(doc.map(|t| t.last_action_handle))
    }

    async fn set_thread_handle(&mut self, entity_key: &str, handle: &str) -> anyhow::Result<()> {
        let key = self.key(&format!("thread:{entity_key}"));
        let doc = ThreadState {
            entity_key: entity_key.to_string(),
            last_action_handle: handle.to_string(),
        };
        self.conn
            .set::<_, _, ()>(&key, serde_json::to_string(&doc)?)
            .await?;
        debug!(entity = entity_key, handle = handle, "thread handle updated");
        Ok(())
    }
}
