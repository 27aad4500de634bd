//! Intent processor: the one door from connections into the session engine.
//!
//! The gateway hands every decoded [`Intent`] to
//! [`IntentProcessor::process`] together with the connection's identity
//! and outbound channel. The processor checks the sender, resolves the
//! session through the registry, and calls the matching actor operation.
//! Accepted operations make the session actor publish snapshots; rejected
//! ones come back here and are turned into a private `error` event for the
//! originating connection only.

use std::collections::HashMap;

use reaper_protocol::{Intent, ParticipantId, ServerEvent, SessionCode};
use reaper_session::{ParticipantSender, SessionError, SessionHandle, SessionRegistry};
use tokio::sync::Mutex;

use crate::ReaperError;

/// Routes intents to sessions and remembers which session each
/// participant is in.
pub struct IntentProcessor {
    registry: SessionRegistry,
    /// At most one session per participant.
    memberships: Mutex<HashMap<ParticipantId, SessionCode>>,
}

impl IntentProcessor {
    pub fn new(registry: SessionRegistry) -> Self {
        Self {
            registry,
            memberships: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Applies one intent on behalf of `origin`.
    ///
    /// On failure the error is also sent to `outbound` as a private
    /// `error` event, so callers may ignore the returned `Result`.
    pub async fn process(
        &self,
        origin: ParticipantId,
        intent: Intent,
        outbound: &ParticipantSender,
    ) -> Result<(), ReaperError> {
        let kind = intent.kind();
        let result = self.dispatch(origin, intent, outbound).await;
        if let Err(e) = &result {
            tracing::debug!(participant = %origin, intent = kind, error = %e, "intent rejected");
            let _ = outbound.send(ServerEvent::error(e.code(), e.to_string()));
        }
        result
    }

    async fn dispatch(
        &self,
        origin: ParticipantId,
        intent: Intent,
        outbound: &ParticipantSender,
    ) -> Result<(), ReaperError> {
        let claimed = intent.participant_id();
        if claimed != origin {
            return Err(SessionError::InvalidState(format!(
                "participantId {claimed} does not belong to this connection"
            ))
            .into());
        }
        let code = SessionCode::parse(intent.session_code().as_str())?;

        match intent {
            Intent::Join { name, .. } => self.join(origin, code, name, outbound).await,
            Intent::Start { .. } => Ok(self.session(&code).await?.start(origin).await?),
            Intent::Move { target_cell, .. } => {
                Ok(self.session(&code).await?.move_to(origin, target_cell).await?)
            }
            Intent::UsePowerUp { power_up_id, .. } => Ok(self
                .session(&code)
                .await?
                .use_power_up(origin, power_up_id)
                .await?),
            Intent::Chat { text, .. } => Ok(self.session(&code).await?.chat(origin, text).await?),
            Intent::Moderate {
                action, target_id, ..
            } => Ok(self
                .session(&code)
                .await?
                .moderate(origin, action, target_id)
                .await?),
            Intent::Answer { answer, .. } => {
                Ok(self.session(&code).await?.answer(origin, answer).await?)
            }
            Intent::RequestValidMoves { .. } => {
                let cells = self.session(&code).await?.valid_moves(origin).await?;
                let _ = outbound.send(ServerEvent::ValidMoves { cells });
                Ok(())
            }
            Intent::Leave { .. } => {
                self.session(&code).await?.leave(origin).await?;
                self.forget(origin, &code).await;
                tracing::info!(participant = %origin, session = %code, "participant left");
                Ok(())
            }
        }
    }

    async fn session(&self, code: &SessionCode) -> Result<SessionHandle, SessionError> {
        self.registry.get(code).await
    }

    /// Joins (creating if needed) the session `code`.
    async fn join(
        &self,
        origin: ParticipantId,
        code: SessionCode,
        name: String,
        outbound: &ParticipantSender,
    ) -> Result<(), ReaperError> {
        let current = self.memberships.lock().await.get(&origin).cloned();
        if let Some(current) = current {
            if self.is_member(origin, &current).await {
                return Err(SessionError::InvalidState(format!(
                    "{origin} is already in session {current}"
                ))
                .into());
            }
            // Kicked or the session ended; the old entry is stale.
            self.forget(origin, &current).await;
        }

        let handle = self.registry.get_or_create(&code).await;
        let joined = match handle.join(origin, name.clone(), outbound.clone()).await {
            Err(SessionError::Unavailable(_)) => {
                // The session emptied and stopped between lookup and join.
                let handle = self.registry.get_or_create(&code).await;
                handle.join(origin, name, outbound.clone()).await
            }
            other => other,
        };
        joined?;

        self.memberships.lock().await.insert(origin, code);
        Ok(())
    }

    /// Takes `origin` out of their session after the connection dropped.
    /// Errors are logged, not returned: there is nobody left to tell.
    pub async fn disconnect(&self, origin: ParticipantId) {
        let Some(code) = self.memberships.lock().await.remove(&origin) else {
            return;
        };
        let Ok(handle) = self.registry.get(&code).await else {
            return;
        };
        match handle.leave(origin).await {
            Ok(()) => {
                tracing::info!(participant = %origin, session = %code, "disconnected participant removed");
            }
            Err(e) => {
                tracing::debug!(participant = %origin, session = %code, error = %e, "disconnect cleanup skipped");
            }
        }
    }

    /// The session `origin` last joined, if it is still recorded.
    pub async fn session_of(&self, origin: ParticipantId) -> Option<SessionCode> {
        self.memberships.lock().await.get(&origin).cloned()
    }

    async fn is_member(&self, origin: ParticipantId, code: &SessionCode) -> bool {
        match self.registry.get(code).await {
            Ok(handle) => handle.is_member(origin).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn forget(&self, origin: ParticipantId, code: &SessionCode) {
        let mut memberships = self.memberships.lock().await;
        if memberships.get(&origin) == Some(code) {
            memberships.remove(&origin);
        }
    }
}
