//! Session registry: maps session codes to live session actors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use rand::SeedableRng;
use rand::rngs::StdRng;
use reaper_protocol::SessionCode;
use tokio::sync::Mutex;

use crate::actor::spawn_session;
use crate::challenge::{ChallengeProvider, WordPuzzles};
use crate::{Session, SessionConfig, SessionError, SessionHandle};

/// Counter for telling apart sessions that reuse a code.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for session actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

pub(crate) struct RegistryInner {
    sessions: Mutex<HashMap<SessionCode, SessionHandle>>,
    config: SessionConfig,
    provider: Arc<dyn ChallengeProvider>,
    /// Sessions created so far; offsets the seed so seeded sessions differ.
    created: AtomicU64,
}

/// Owns every live session of the process.
///
/// Created once at startup and handed to whoever routes intents; there is
/// no global registry. Cheap to clone; clones share the same map.
///
/// A session removes itself when its roster empties, so the registry
/// never holds an empty game for longer than one command.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    /// Creates an empty registry whose sessions use `config` and the
    /// built-in word puzzles.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_provider(config, Arc::new(WordPuzzles))
    }

    /// Creates an empty registry whose sessions ask `provider` for
    /// challenges.
    pub fn with_provider(config: SessionConfig, provider: Arc<dyn ChallengeProvider>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: Mutex::new(HashMap::new()),
                config: config.validated(),
                provider,
                created: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<RegistryInner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Returns the live session for `code`, creating it if there is none.
    ///
    /// Lookup and creation happen under one lock, so concurrent callers
    /// with the same unseen code get the same session. An entry whose
    /// actor has stopped is replaced.
    pub async fn get_or_create(&self, code: &SessionCode) -> SessionHandle {
        let mut sessions = self.inner.sessions.lock().await;
        if let Some(handle) = sessions.get(code) {
            if !handle.is_closed() {
                return handle.clone();
            }
        }

        let instance = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
        let session = Session::with_provider(
            code.clone(),
            self.inner.config.clone(),
            self.next_rng(),
            Arc::clone(&self.inner.provider),
        );
        let handle = spawn_session(
            session,
            instance,
            DEFAULT_CHANNEL_SIZE,
            Arc::downgrade(&self.inner),
        );
        sessions.insert(code.clone(), handle.clone());
        tracing::info!(session = %code, instance, "session created");
        handle
    }

    /// Returns the live session for `code`.
    ///
    /// # Errors
    /// `NotFound` if there is none.
    pub async fn get(&self, code: &SessionCode) -> Result<SessionHandle, SessionError> {
        self.inner
            .sessions
            .lock()
            .await
            .get(code)
            .filter(|h| !h.is_closed())
            .cloned()
            .ok_or_else(|| SessionError::NotFound(code.clone()))
    }

    /// Evicts `code` and stops its actor. Returns `false` if there was
    /// nothing to evict; calling it twice is harmless.
    pub async fn remove(&self, code: &SessionCode) -> bool {
        let handle = self.inner.sessions.lock().await.remove(code);
        match handle {
            Some(handle) => {
                let _ = handle.shutdown().await;
                tracing::info!(session = %code, "session removed");
                true
            }
            None => false,
        }
    }

    /// Evicts `code` only if the entry is still session `instance` and
    /// that session has stopped. Sessions call this when their roster
    /// empties; a newer session under the same code is left alone.
    pub async fn evict_if_empty(&self, code: &SessionCode, instance: u64) -> bool {
        let mut sessions = self.inner.sessions.lock().await;
        let stale = sessions
            .get(code)
            .is_some_and(|h| h.instance() == instance && h.is_closed());
        if stale {
            sessions.remove(code);
            tracing::info!(session = %code, instance, "empty session evicted");
        }
        stale
    }

    /// Stops every session and empties the registry.
    pub async fn clear(&self) {
        let handles: Vec<SessionHandle> = {
            let mut sessions = self.inner.sessions.lock().await;
            sessions.drain().map(|(_, h)| h).collect()
        };
        let count = handles.len();
        for handle in handles {
            let _ = handle.shutdown().await;
        }
        tracing::info!(sessions = count, "registry cleared");
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Registered session codes, sorted.
    pub async fn codes(&self) -> Vec<SessionCode> {
        let mut codes: Vec<SessionCode> =
            self.inner.sessions.lock().await.keys().cloned().collect();
        codes.sort();
        codes
    }

    fn next_rng(&self) -> StdRng {
        let n = self.inner.created.fetch_add(1, Ordering::Relaxed);
        match self.inner.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(n)),
            None => StdRng::from_os_rng(),
        }
    }
}
