use std::{
    num::NonZeroUsize,
    time::{Duration, Instant},
};

use anoncreds_types::data_types::{
    identifiers::{rev_reg_id::RevocationRegistryId, schema_id::SchemaId},
    ledger::{rev_reg::RevocationRegistry, schema::Schema},
};
use async_trait::async_trait;
use lru::LruCache;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{
    errors::error::{VcxLedgerError, VcxLedgerResult},
    ledger::base_ledger::AnoncredsLedgerRead,
};

#[derive(Clone, Debug, Deserialize)]
pub struct InMemoryResponseCacherConfig {
    ttl: Duration,
    capacity: NonZeroUsize,
}

impl InMemoryResponseCacherConfig {
    pub fn new(ttl: Duration, capacity: usize) -> VcxLedgerResult<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or(VcxLedgerError::InvalidOption(
            "Failed to parse cache capacity into NonZeroUsize".into(),
        ))?;
        Ok(Self { ttl, capacity })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }
}

/// Ledger reader keeping resolved schemas in an LRU cache. Revocation registry state is
/// never cached, currency checks need the live answer.
#[derive(Debug)]
pub struct CachingLedgerRead<L> {
    inner: L,
    ttl: Duration,
    schemas: Mutex<LruCache<SchemaId, (Instant, Schema)>>,
}

impl<L> CachingLedgerRead<L> {
    pub fn new(inner: L, config: InMemoryResponseCacherConfig) -> Self {
        Self {
            inner,
            ttl: config.ttl(),
            schemas: Mutex::new(LruCache::new(config.capacity())),
        }
    }
}

#[async_trait]
impl<L> AnoncredsLedgerRead for CachingLedgerRead<L>
where
    L: AnoncredsLedgerRead,
{
    async fn get_schema(&self, schema_id: &SchemaId) -> VcxLedgerResult<Schema> {
        {
            let mut cache = self.schemas.lock().await;
            if let Some((stored_at, schema)) = cache.get(schema_id) {
                if stored_at.elapsed() < self.ttl {
                    trace!("get_schema >> cache hit for {schema_id}");
                    return Ok(schema.clone());
                }
                cache.pop(schema_id);
            }
        }

        let schema = self.inner.get_schema(schema_id).await?;
        self.schemas
            .lock()
            .await
            .put(schema_id.clone(), (Instant::now(), schema.clone()));
        Ok(schema)
    }

    async fn get_rev_reg(
        &self,
        rev_reg_id: &RevocationRegistryId,
        to_timestamp: Option<u64>,
    ) -> VcxLedgerResult<RevocationRegistry> {
        self.inner.get_rev_reg(rev_reg_id, to_timestamp).await
    }
}
