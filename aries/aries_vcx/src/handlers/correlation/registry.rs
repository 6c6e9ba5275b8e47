use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use tokio::sync::{Mutex, MutexGuard};

use super::thread::ExchangeThread;
use crate::errors::error::prelude::*;

/// One registered thread. Transitions run under `state`; `generation` is bumped by
/// operations that must win over a transition already in flight.
#[derive(Debug)]
pub struct ThreadSlot {
    generation: AtomicU64,
    state: Mutex<ExchangeThread>,
}

impl ThreadSlot {
    fn new(thread: ExchangeThread) -> Self {
        Self {
            generation: AtomicU64::new(0),
            state: Mutex::new(thread),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, ExchangeThread> {
        self.state.lock().await
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Exchange threads by thread id, plus an index from our pairwise verkeys to the
/// connection thread owning them.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    threads: RwLock<HashMap<String, Arc<ThreadSlot>>>,
    connection_keys: RwLock<HashMap<String, String>>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_threads_read(&self) -> VcxResult<RwLockReadGuard<'_, HashMap<String, Arc<ThreadSlot>>>> {
        self.threads.read().map_err(|err| {
            error!("Unable to read-lock thread registry: {:?}", err);
            AriesVcxError::from_msg(
                AriesVcxErrorKind::LockError,
                format!("Unable to lock thread registry: {err}"),
            )
        })
    }

    fn lock_threads_write(
        &self,
    ) -> VcxResult<RwLockWriteGuard<'_, HashMap<String, Arc<ThreadSlot>>>> {
        self.threads.write().map_err(|err| {
            error!("Unable to write-lock thread registry: {:?}", err);
            AriesVcxError::from_msg(
                AriesVcxErrorKind::LockError,
                format!("Unable to lock thread registry: {err}"),
            )
        })
    }

    /// Registers a new thread. Thread ids are never reused.
    pub fn insert(&self, thread: ExchangeThread) -> VcxResult<Arc<ThreadSlot>> {
        let mut threads = self.lock_threads_write()?;
        if threads.contains_key(&thread.thread_id) {
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidState,
                format!("Thread {} is already registered", thread.thread_id),
            ));
        }
        let thread_id = thread.thread_id.clone();
        let slot = Arc::new(ThreadSlot::new(thread));
        threads.insert(thread_id, slot.clone());
        Ok(slot)
    }

    pub fn get(&self, thread_id: &str) -> VcxResult<Option<Arc<ThreadSlot>>> {
        Ok(self.lock_threads_read()?.get(thread_id).cloned())
    }

    pub fn get_existing(&self, thread_id: &str) -> VcxResult<Arc<ThreadSlot>> {
        self.get(thread_id)?.ok_or_else(|| {
            AriesVcxError::from_msg(
                AriesVcxErrorKind::NotFound,
                format!("Thread {thread_id} not found"),
            )
        })
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.lock_threads_read()
            .map(|threads| threads.contains_key(thread_id))
            .unwrap_or(false)
    }

    pub fn thread_ids(&self) -> VcxResult<Vec<String>> {
        let mut ids: Vec<String> = self.lock_threads_read()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    pub fn slots(&self) -> VcxResult<Vec<Arc<ThreadSlot>>> {
        Ok(self.lock_threads_read()?.values().cloned().collect())
    }

    pub fn bind_connection_key(&self, verkey: &str, connection_id: &str) -> VcxResult<()> {
        let mut keys = self.connection_keys.write().map_err(|err| {
            AriesVcxError::from_msg(
                AriesVcxErrorKind::LockError,
                format!("Unable to lock connection key index: {err}"),
            )
        })?;
        keys.insert(verkey.to_owned(), connection_id.to_owned());
        Ok(())
    }

    /// Connection thread that owns the pairwise `verkey`.
    pub fn connection_for_key(&self, verkey: &str) -> VcxResult<Option<String>> {
        let keys = self.connection_keys.read().map_err(|err| {
            AriesVcxError::from_msg(
                AriesVcxErrorKind::LockError,
                format!("Unable to lock connection key index: {err}"),
            )
        })?;
        Ok(keys.get(verkey).cloned())
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::{
        global::settings::RetryPolicy,
        handlers::correlation::thread::ThreadMachine,
        protocols::trustping::TrustPingSender,
    };

    fn ping_thread() -> ExchangeThread {
        let sender = TrustPingSender::build(true, None);
        ExchangeThread::new(
            sender.get_thread_id().to_owned(),
            ThreadMachine::TrustPing(sender),
            Some("connection-1".to_owned()),
            RetryPolicy {
                reply_timeout_ms: 100,
                max_retries: 0,
            },
        )
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let registry = ThreadRegistry::new();
        let thread = ping_thread();
        let thread_id = thread.thread_id.clone();
        registry.insert(thread).unwrap();

        let slot = registry.get_existing(&thread_id).unwrap();
        assert_eq!(slot.lock().await.thread_id, thread_id);
        assert!(registry.contains(&thread_id));
        assert_eq!(registry.thread_ids().unwrap(), vec![thread_id]);
        assert!(registry.get("unknown").unwrap().is_none());
        assert_eq!(
            registry.get_existing("unknown").unwrap_err().kind(),
            AriesVcxErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_thread_ids_are_not_reused() {
        let registry = ThreadRegistry::new();
        let thread = ping_thread();
        registry.insert(thread.clone()).unwrap();
        let err = registry.insert(thread).unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::InvalidState);
    }

    #[test]
    fn test_generation_bumps() {
        let slot = ThreadSlot::new(ping_thread());
        assert_eq!(slot.generation(), 0);
        assert_eq!(slot.bump_generation(), 1);
        assert_eq!(slot.generation(), 1);
    }

    #[test]
    fn test_connection_key_index() {
        let registry = ThreadRegistry::new();
        registry.bind_connection_key("vk-1", "connection-1").unwrap();
        assert_eq!(
            registry.connection_for_key("vk-1").unwrap().as_deref(),
            Some("connection-1")
        );
        assert!(registry.connection_for_key("vk-2").unwrap().is_none());
    }
}
