//! `ReaperServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → intent processor →
//! session actors.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use reaper_protocol::{Codec, JsonCodec};
use reaper_session::{ChallengeProvider, SessionConfig, SessionRegistry};
use reaper_transport::{Transport, TransportError, WebSocketTransport};

use crate::config::{DEFAULT_BIND, ServerConfig};
use crate::handler::handle_connection;
use crate::{IntentProcessor, ReaperError};

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) processor: IntentProcessor,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,no_run
/// # async fn run() -> Result<(), reapers_whispers::ReaperError> {
/// use reapers_whispers::prelude::*;
///
/// let server = ReaperServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ReaperServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    provider: Option<Arc<dyn ChallengeProvider>>,
}

impl ReaperServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            session_config: SessionConfig::default(),
            provider: None,
        }
    }

    /// Sets the address to bind the server to. Port `0` picks a free one.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every new session starts with.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Applies a whole [`ServerConfig`], e.g. one read from the environment.
    pub fn config(self, config: ServerConfig) -> Self {
        self.bind(&config.bind_addr).session_config(config.session)
    }

    /// Replaces the built-in word puzzles guarding power-up pickups.
    pub fn challenge_provider(mut self, provider: Arc<dyn ChallengeProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Binds the listener. Uses [`JsonCodec`] on a WebSocket transport.
    pub async fn build(self) -> Result<ReaperServer<JsonCodec>, ReaperError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let config = self.session_config.validated();
        let registry = match self.provider {
            Some(provider) => SessionRegistry::with_provider(config, provider),
            None => SessionRegistry::new(config),
        };

        let state = Arc::new(ServerState {
            processor: IntentProcessor::new(registry),
            codec: JsonCodec,
        });

        Ok(ReaperServer { transport, state })
    }
}

impl Default for ReaperServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound server, ready to accept connections.
pub struct ReaperServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl ReaperServer<JsonCodec> {
    pub fn builder() -> ReaperServerBuilder {
        ReaperServerBuilder::new()
    }
}

impl<C: Codec> ReaperServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ReaperError> {
        Ok(self.transport.local_addr()?)
    }

    /// The sessions this server hosts.
    pub fn registry(&self) -> &SessionRegistry {
        self.state.processor.registry()
    }

    /// Accepts connections until the process is terminated.
    pub async fn run(self) -> Result<(), ReaperError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` completes, then stops the
    /// listener and every session actor.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ReaperError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Reaper's Whispers server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(TransportError::Shutdown) => break,
                    Err(e) => {
                        // A failed handshake only affects that client.
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.transport.shutdown().await?;
        self.state.processor.registry().clear().await;
        tracing::info!("server stopped");
        Ok(())
    }
}
