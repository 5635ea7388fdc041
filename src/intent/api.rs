//! Intent API
//!
//! Acts on behalf of one virtual user. Every action first provisions the user
//! lazily:
//! - Ensure-Registered: register the account unless the store already knows it
//! - Ensure-Joined: join the room unless the store already records it, falling
//!   back to a bot invite when a direct join is forbidden
//!
//! ## Concurrency
//!
//! By default the check-then-provision sequence is not locked. Two callers
//! may both see "unknown" and both provision. This race is benign: the second
//! registration fails with `M_USER_IN_USE`, which is treated as success, and
//! joining a room twice is idempotent on the homeserver. Use
//! [`IntentApi::with_locks`] to serialize attempts per key instead.

use super::locks::{ProvisionKey, ProvisioningLocks};
use super::state_store::{Membership, StateStore, StoreError};
use super::traits::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Errors surfaced by intent actions
///
/// Transport errors are carried exactly as the client returned them.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),
}

impl IntentError {
    /// The underlying transport error, if any
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(err) => Some(err),
            Self::Store(_) => None,
        }
    }
}

pub type IntentResult<T> = Result<T, IntentError>;

/// Privileged bridge identity used to invite users that cannot join directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: UserId,
}

/// Actions on behalf of one virtual user
pub struct IntentApi<C: TransportClient> {
    client: Arc<C>,
    bot: Option<BotIdentity>,
    state: Arc<dyn StateStore>,
    locks: Option<ProvisioningLocks>,
    localpart: String,
    user_id: UserId,
}

impl<C: TransportClient> Clone for IntentApi<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            bot: self.bot.clone(),
            state: Arc::clone(&self.state),
            locks: self.locks.clone(),
            localpart: self.localpart.clone(),
            user_id: self.user_id.clone(),
        }
    }
}

impl<C: TransportClient> IntentApi<C> {
    /// Create an intent for `localpart` on `domain`
    ///
    /// `bot` must be `None` when this intent is the bot itself.
    pub fn new(
        localpart: impl Into<String>,
        domain: &str,
        client: Arc<C>,
        state: Arc<dyn StateStore>,
        bot: Option<BotIdentity>,
    ) -> Self {
        let localpart = localpart.into();
        let user_id = UserId::new(&localpart, domain);
        Self {
            client,
            bot,
            state,
            locks: None,
            localpart,
            user_id,
        }
    }

    /// Serialize provisioning attempts per user and per (user, room)
    pub fn with_locks(mut self, locks: ProvisioningLocks) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn localpart(&self) -> &str {
        &self.localpart
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn bot(&self) -> Option<&BotIdentity> {
        self.bot.as_ref()
    }

    /// Register the account unconditionally, without consulting the store
    pub async fn register(&self) -> Result<RegisterResponse, TransportError> {
        self.client.register(&self.localpart).await
    }

    /// Make sure the account exists on the homeserver
    pub async fn ensure_registered(&self) -> IntentResult<()> {
        if self.state.is_registered(&self.user_id).await? {
            debug!(user = %self.user_id, "registration cached");
            return Ok(());
        }

        let _guard = match &self.locks {
            Some(locks) => {
                let guard = locks
                    .acquire(ProvisionKey::Register(self.user_id.clone()))
                    .await;
                // Another caller may have finished while we waited.
                if self.state.is_registered(&self.user_id).await? {
                    return Ok(());
                }
                Some(guard)
            }
            None => None,
        };

        debug!(user = %self.user_id, "registering user");
        match self.register().await {
            Ok(_) => info!(user = %self.user_id, "registered user"),
            Err(err) if err.is_user_in_use() => {
                debug!(user = %self.user_id, "user already registered");
            }
            Err(err) => return Err(err.into()),
        }

        self.state.mark_registered(&self.user_id).await?;
        Ok(())
    }

    /// Make sure the user is a member of `room`
    pub async fn ensure_joined(&self, room: &RoomId) -> IntentResult<()> {
        if self.state.is_joined(&self.user_id, room).await? {
            debug!(user = %self.user_id, room = %room, "membership cached");
            return Ok(());
        }

        let _guard = match &self.locks {
            Some(locks) => {
                let guard = locks
                    .acquire(ProvisionKey::Join(self.user_id.clone(), room.clone()))
                    .await;
                if self.state.is_joined(&self.user_id, room).await? {
                    return Ok(());
                }
                Some(guard)
            }
            None => None,
        };

        self.ensure_registered().await?;

        debug!(user = %self.user_id, room = %room, "joining room");
        let joined = match self.client.join_room(&self.user_id, room).await {
            Ok(resp) => resp,
            Err(err) => self.join_via_bot_invite(room, err).await?,
        };

        info!(user = %self.user_id, room = %joined.room_id, "joined room");
        self.state
            .set_membership(&joined.room_id, &self.user_id, Membership::Join)
            .await?;
        Ok(())
    }

    /// Recover from a failed join by having the bot invite us, then retry once
    async fn join_via_bot_invite(
        &self,
        room: &RoomId,
        join_err: TransportError,
    ) -> Result<JoinResponse, TransportError> {
        let bot = match &self.bot {
            Some(bot) if join_err.is_forbidden() => bot,
            _ => return Err(join_err),
        };

        debug!(user = %self.user_id, room = %room, bot = %bot.user_id, "join forbidden, inviting via bot");
        if let Err(invite_err) = self
            .client
            .invite_user(&bot.user_id, room, &self.user_id)
            .await
        {
            warn!(
                user = %self.user_id,
                room = %room,
                error = %invite_err,
                "bot invite failed, returning original join error"
            );
            return Err(join_err);
        }

        self.client.join_room(&self.user_id, room).await
    }

    pub async fn send_message_event(
        &self,
        room: &RoomId,
        event_type: &str,
        content: &Value,
    ) -> IntentResult<SendEventResponse> {
        self.ensure_joined(room).await?;
        Ok(self
            .client
            .send_message_event(&self.user_id, room, event_type, content)
            .await?)
    }

    /// Send a message event with an explicit origin timestamp (milliseconds)
    pub async fn send_massaged_message_event(
        &self,
        room: &RoomId,
        event_type: &str,
        content: &Value,
        ts: i64,
    ) -> IntentResult<SendEventResponse> {
        self.ensure_joined(room).await?;
        Ok(self
            .client
            .send_massaged_message_event(&self.user_id, room, event_type, content, ts)
            .await?)
    }

    pub async fn send_state_event(
        &self,
        room: &RoomId,
        event_type: &str,
        state_key: &str,
        content: &Value,
    ) -> IntentResult<SendEventResponse> {
        self.ensure_joined(room).await?;
        Ok(self
            .client
            .send_state_event(&self.user_id, room, event_type, state_key, content)
            .await?)
    }

    pub async fn send_massaged_state_event(
        &self,
        room: &RoomId,
        event_type: &str,
        state_key: &str,
        content: &Value,
        ts: i64,
    ) -> IntentResult<SendEventResponse> {
        self.ensure_joined(room).await?;
        Ok(self
            .client
            .send_massaged_state_event(&self.user_id, room, event_type, state_key, content, ts)
            .await?)
    }

    pub async fn send_text(&self, room: &RoomId, text: &str) -> IntentResult<SendEventResponse> {
        let content = json!({ "msgtype": "m.text", "body": text });
        self.send_message_event(room, "m.room.message", &content)
            .await
    }

    pub async fn send_notice(&self, room: &RoomId, text: &str) -> IntentResult<SendEventResponse> {
        let content = json!({ "msgtype": "m.notice", "body": text });
        self.send_message_event(room, "m.room.message", &content)
            .await
    }

    pub async fn send_image(
        &self,
        room: &RoomId,
        body: &str,
        url: &str,
    ) -> IntentResult<SendEventResponse> {
        let content = json!({ "msgtype": "m.image", "body": body, "url": url });
        self.send_message_event(room, "m.room.message", &content)
            .await
    }

    pub async fn send_video(
        &self,
        room: &RoomId,
        body: &str,
        url: &str,
    ) -> IntentResult<SendEventResponse> {
        let content = json!({ "msgtype": "m.video", "body": body, "url": url });
        self.send_message_event(room, "m.room.message", &content)
            .await
    }

    pub async fn redact_event(
        &self,
        room: &RoomId,
        event_id: &str,
        request: &RedactRequest,
    ) -> IntentResult<SendEventResponse> {
        self.ensure_joined(room).await?;
        Ok(self
            .client
            .redact_event(&self.user_id, room, event_id, request)
            .await?)
    }

    pub async fn set_room_name(&self, room: &RoomId, name: &str) -> IntentResult<SendEventResponse> {
        self.send_state_event(room, "m.room.name", "", &json!({ "name": name }))
            .await
    }

    pub async fn set_room_avatar(
        &self,
        room: &RoomId,
        avatar_url: &str,
    ) -> IntentResult<SendEventResponse> {
        self.send_state_event(room, "m.room.avatar", "", &json!({ "url": avatar_url }))
            .await
    }

    pub async fn set_room_topic(
        &self,
        room: &RoomId,
        topic: &str,
    ) -> IntentResult<SendEventResponse> {
        self.send_state_event(room, "m.room.topic", "", &json!({ "topic": topic }))
            .await
    }

    /// Profile changes need registration only, no room
    pub async fn set_display_name(&self, display_name: &str) -> IntentResult<()> {
        self.ensure_registered().await?;
        Ok(self
            .client
            .set_display_name(&self.user_id, display_name)
            .await?)
    }

    pub async fn set_avatar_url(&self, avatar_url: &str) -> IntentResult<()> {
        self.ensure_registered().await?;
        Ok(self.client.set_avatar_url(&self.user_id, avatar_url).await?)
    }
}
