//! Mock Transport Client for Testing
//!
//! In-process homeserver with just enough room semantics to exercise the
//! provisioning gates: registration, public and invite-only rooms, aliases,
//! invites, and event sending. Failures can be scripted per operation.

use super::state_store::{Membership, StoreSnapshot};
use super::traits::*;
use crate::protocol::Event;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Client operations, for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Register,
    Join,
    Invite,
    SendMessage,
    SendState,
    Redact,
    SetDisplayName,
    SetAvatarUrl,
}

/// Who may join a room without an invite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRule {
    Public,
    Invite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockProfile {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug)]
struct MockRoom {
    join_rule: JoinRule,
    members: HashSet<UserId>,
    invited: HashSet<UserId>,
    events: Vec<Event>,
}

impl MockRoom {
    fn new(join_rule: JoinRule) -> Self {
        Self {
            join_rule,
            members: HashSet::new(),
            invited: HashSet::new(),
            events: Vec::new(),
        }
    }
}

#[derive(Default)]
struct MockState {
    registered: HashSet<String>,
    rooms: HashMap<RoomId, MockRoom>,
    aliases: HashMap<RoomId, RoomId>,
    profiles: HashMap<UserId, MockProfile>,
    calls: HashMap<Operation, usize>,
    failures: HashMap<Operation, VecDeque<TransportError>>,
    next_event_id: u64,
}

/// Mock homeserver client
#[derive(Clone)]
pub struct MockTransportClient {
    state: Arc<Mutex<MockState>>,
    domain: String,
    yield_on_call: Arc<AtomicBool>,
}

impl MockTransportClient {
    /// Create an empty homeserver for `domain`
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            domain: domain.into(),
            yield_on_call: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Yield to the scheduler before handling each call, so concurrent
    /// callers interleave at the network boundary
    pub fn set_yield_on_call(&self, enabled: bool) {
        self.yield_on_call.store(enabled, Ordering::SeqCst);
    }

    /// Make the next call of `operation` fail with `error`
    ///
    /// Multiple failures queue up in order.
    pub fn fail_next(&self, operation: Operation, error: TransportError) {
        self.state()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Number of times `operation` was called, including failed calls
    pub fn calls(&self, operation: Operation) -> usize {
        self.state().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Register an account directly on the server
    pub fn register_user(&self, localpart: &str) {
        self.state().registered.insert(localpart.to_string());
    }

    pub fn is_registered(&self, localpart: &str) -> bool {
        self.state().registered.contains(localpart)
    }

    pub fn create_room(&self, room: &RoomId, join_rule: JoinRule) {
        self.state()
            .rooms
            .insert(room.clone(), MockRoom::new(join_rule));
    }

    pub fn add_alias(&self, alias: &RoomId, room: &RoomId) {
        self.state().aliases.insert(alias.clone(), room.clone());
    }

    /// Put `user` into `room` directly, creating the room if needed
    pub fn add_member(&self, room: &RoomId, user: &UserId) {
        self.state()
            .rooms
            .entry(room.clone())
            .or_insert_with(|| MockRoom::new(JoinRule::Invite))
            .members
            .insert(user.clone());
    }

    pub fn is_member(&self, room: &RoomId, user: &UserId) -> bool {
        self.state()
            .rooms
            .get(room)
            .map(|r| r.members.contains(user))
            .unwrap_or(false)
    }

    /// Events sent to `room`, oldest first
    pub fn sent_events(&self, room: &RoomId) -> Vec<Event> {
        self.state()
            .rooms
            .get(room)
            .map(|r| r.events.clone())
            .unwrap_or_default()
    }

    pub fn profile(&self, user: &UserId) -> Option<MockProfile> {
        self.state().profiles.get(user).cloned()
    }

    /// Mirror previously cached facts onto the server
    ///
    /// Registered users become accounts and joined memberships become room
    /// members, so a persisted state store stays consistent with a fresh mock.
    pub fn seed_from(&self, snapshot: &StoreSnapshot) {
        let mut state = self.state();
        for user in &snapshot.registered {
            if let Some(localpart) = user.localpart() {
                state.registered.insert(localpart.to_string());
            }
        }
        for (room, members) in &snapshot.memberships {
            let mock_room = state
                .rooms
                .entry(room.clone())
                .or_insert_with(|| MockRoom::new(JoinRule::Invite));
            for (user, membership) in members {
                match membership {
                    Membership::Join => {
                        mock_room.members.insert(user.clone());
                    }
                    Membership::Invite => {
                        mock_room.invited.insert(user.clone());
                    }
                    _ => {}
                }
            }
        }
    }

    /// Count the call and pop a scripted failure, if any
    async fn begin(&self, operation: Operation) -> TransportResult<()> {
        if self.yield_on_call.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        let mut state = self.state();
        *state.calls.entry(operation).or_default() += 1;
        match state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record_event(
        &self,
        actor: &UserId,
        room: &RoomId,
        event_type: &str,
        content: &Value,
        ts: Option<i64>,
    ) -> TransportResult<SendEventResponse> {
        let mut state = self.state();
        state.next_event_id += 1;
        let event_id = format!("$event{}:{}", state.next_event_id, self.domain);

        let mock_room = state
            .rooms
            .get_mut(room)
            .ok_or_else(|| TransportError::not_found(format!("Unknown room {}", room)))?;
        if !mock_room.members.contains(actor) {
            return Err(TransportError::forbidden(format!(
                "User {} not in room {}",
                actor, room
            )));
        }

        mock_room.events.push(Event {
            id: event_id.clone(),
            event_type: event_type.to_string(),
            content: content.clone(),
            sender: actor.to_string(),
            room_id: room.to_string(),
            origin_server_ts: ts.unwrap_or_else(now_millis),
            age: 0,
        });

        Ok(SendEventResponse { event_id })
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[async_trait]
impl TransportClient for MockTransportClient {
    async fn register(&self, username: &str) -> TransportResult<RegisterResponse> {
        self.begin(Operation::Register).await?;

        let mut state = self.state();
        if !state.registered.insert(username.to_string()) {
            return Err(TransportError::user_in_use("User ID already taken."));
        }
        Ok(RegisterResponse {
            user_id: UserId::new(username, &self.domain),
        })
    }

    async fn join_room(&self, actor: &UserId, room: &RoomId) -> TransportResult<JoinResponse> {
        self.begin(Operation::Join).await?;

        let mut state = self.state();
        let room_id = state.aliases.get(room).cloned().unwrap_or_else(|| room.clone());
        let mock_room = state
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| TransportError::not_found(format!("Unknown room {}", room)))?;

        let invited = mock_room.invited.remove(actor);
        let allowed = mock_room.join_rule == JoinRule::Public
            || invited
            || mock_room.members.contains(actor);
        if !allowed {
            return Err(TransportError::forbidden("You are not invited to this room."));
        }

        mock_room.members.insert(actor.clone());
        Ok(JoinResponse { room_id })
    }

    async fn invite_user(
        &self,
        actor: &UserId,
        room: &RoomId,
        invitee: &UserId,
    ) -> TransportResult<()> {
        self.begin(Operation::Invite).await?;

        let mut state = self.state();
        let room_id = state.aliases.get(room).cloned().unwrap_or_else(|| room.clone());
        let mock_room = state
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| TransportError::not_found(format!("Unknown room {}", room)))?;
        if !mock_room.members.contains(actor) {
            return Err(TransportError::forbidden(format!(
                "{} is not in the room",
                actor
            )));
        }

        mock_room.invited.insert(invitee.clone());
        Ok(())
    }

    async fn send_message_event(
        &self,
        actor: &UserId,
        room: &RoomId,
        event_type: &str,
        content: &Value,
    ) -> TransportResult<SendEventResponse> {
        self.begin(Operation::SendMessage).await?;
        self.record_event(actor, room, event_type, content, None)
    }

    async fn send_massaged_message_event(
        &self,
        actor: &UserId,
        room: &RoomId,
        event_type: &str,
        content: &Value,
        ts: i64,
    ) -> TransportResult<SendEventResponse> {
        self.begin(Operation::SendMessage).await?;
        self.record_event(actor, room, event_type, content, Some(ts))
    }

    async fn send_state_event(
        &self,
        actor: &UserId,
        room: &RoomId,
        event_type: &str,
        _state_key: &str,
        content: &Value,
    ) -> TransportResult<SendEventResponse> {
        self.begin(Operation::SendState).await?;
        self.record_event(actor, room, event_type, content, None)
    }

    async fn send_massaged_state_event(
        &self,
        actor: &UserId,
        room: &RoomId,
        event_type: &str,
        _state_key: &str,
        content: &Value,
        ts: i64,
    ) -> TransportResult<SendEventResponse> {
        self.begin(Operation::SendState).await?;
        self.record_event(actor, room, event_type, content, Some(ts))
    }

    async fn redact_event(
        &self,
        actor: &UserId,
        room: &RoomId,
        event_id: &str,
        request: &RedactRequest,
    ) -> TransportResult<SendEventResponse> {
        self.begin(Operation::Redact).await?;

        let mut content = json!({ "redacts": event_id });
        if let Some(reason) = &request.reason {
            content["reason"] = json!(reason);
        }
        self.record_event(actor, room, "m.room.redaction", &content, None)
    }

    async fn set_display_name(&self, actor: &UserId, display_name: &str) -> TransportResult<()> {
        self.begin(Operation::SetDisplayName).await?;
        self.state()
            .profiles
            .entry(actor.clone())
            .or_default()
            .display_name = Some(display_name.to_string());
        Ok(())
    }

    async fn set_avatar_url(&self, actor: &UserId, avatar_url: &str) -> TransportResult<()> {
        self.begin(Operation::SetAvatarUrl).await?;
        self.state()
            .profiles
            .entry(actor.clone())
            .or_default()
            .avatar_url = Some(avatar_url.to_string());
        Ok(())
    }
}
