//! Registration and Membership State Store
//!
//! Cached projection of homeserver truth consulted by the provisioning gates:
//! - Registration facts keyed by user
//! - Membership facts keyed by (room, user)
//!
//! The cache may be stale. A recorded fact is only ever used to skip
//! provisioning, never to assert live state.

use super::traits::{RoomId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

/// Current on-disk schema of `JsonFileStateStore`
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Room membership state
///
/// Only `Join` is interpreted by the gates; other values are stored opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Membership {
    Join,
    Invite,
    Leave,
    Ban,
    Knock,
    Other(String),
}

impl Membership {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Join => "join",
            Self::Invite => "invite",
            Self::Leave => "leave",
            Self::Ban => "ban",
            Self::Knock => "knock",
            Self::Other(value) => value,
        }
    }
}

impl From<&str> for Membership {
    fn from(value: &str) -> Self {
        match value {
            "join" => Self::Join,
            "invite" => Self::Invite,
            "leave" => Self::Leave,
            "ban" => Self::Ban,
            "knock" => Self::Knock,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Membership {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Membership> for String {
    fn from(value: Membership) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported state schema: expected {expected}, found {found}")]
    UnsupportedSchema { expected: u32, found: u32 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Registration/membership cache consulted by `IntentApi`
///
/// Implementations are shared between every intent and must tolerate
/// concurrent callers.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn is_registered(&self, user: &UserId) -> StoreResult<bool>;

    /// Record that `user` exists on the homeserver. Idempotent.
    async fn mark_registered(&self, user: &UserId) -> StoreResult<()>;

    async fn is_joined(&self, user: &UserId, room: &RoomId) -> StoreResult<bool>;

    async fn set_membership(
        &self,
        room: &RoomId,
        user: &UserId,
        membership: Membership,
    ) -> StoreResult<()>;

    /// Last recorded membership of `user` in `room`
    async fn membership(&self, user: &UserId, room: &RoomId) -> StoreResult<Option<Membership>>;
}

/// Serializable contents of a state store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub schema_version: u32,
    #[serde(default)]
    pub registered: BTreeSet<UserId>,
    #[serde(default)]
    pub memberships: BTreeMap<RoomId, BTreeMap<UserId, Membership>>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            registered: BTreeSet::new(),
            memberships: BTreeMap::new(),
        }
    }
}

impl StoreSnapshot {
    fn is_joined(&self, user: &UserId, room: &RoomId) -> bool {
        self.membership(user, room) == Some(&Membership::Join)
    }

    fn membership(&self, user: &UserId, room: &RoomId) -> Option<&Membership> {
        self.memberships.get(room)?.get(user)
    }

    /// Returns true if the registration fact is new
    fn mark_registered(&mut self, user: &UserId) -> bool {
        self.registered.insert(user.clone())
    }

    /// Returns true if the stored membership changed
    fn set_membership(&mut self, room: &RoomId, user: &UserId, membership: Membership) -> bool {
        let members = self.memberships.entry(room.clone()).or_default();
        if members.get(user) == Some(&membership) {
            return false;
        }
        members.insert(user.clone(), membership);
        true
    }

    /// Rooms `user` is recorded as joined to
    pub fn joined_rooms(&self, user: &UserId) -> Vec<RoomId> {
        self.memberships
            .iter()
            .filter(|(_, members)| members.get(user) == Some(&Membership::Join))
            .map(|(room, _)| room.clone())
            .collect()
    }
}

/// In-memory state store
///
/// Facts live only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: RwLock<StoreSnapshot>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current facts
    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn is_registered(&self, user: &UserId) -> StoreResult<bool> {
        Ok(self.state.read().await.registered.contains(user))
    }

    async fn mark_registered(&self, user: &UserId) -> StoreResult<()> {
        self.state.write().await.mark_registered(user);
        Ok(())
    }

    async fn is_joined(&self, user: &UserId, room: &RoomId) -> StoreResult<bool> {
        Ok(self.state.read().await.is_joined(user, room))
    }

    async fn set_membership(
        &self,
        room: &RoomId,
        user: &UserId,
        membership: Membership,
    ) -> StoreResult<()> {
        self.state
            .write()
            .await
            .set_membership(room, user, membership);
        Ok(())
    }

    async fn membership(&self, user: &UserId, room: &RoomId) -> StoreResult<Option<Membership>> {
        Ok(self.state.read().await.membership(user, room).cloned())
    }
}

/// Durable state store persisted as a JSON file
///
/// Every change is written through with an atomic replace, so a crash never
/// leaves a truncated file behind. A change is visible only once it is saved.
#[derive(Debug)]
pub struct JsonFileStateStore {
    path: PathBuf,
    state: Mutex<StoreSnapshot>,
}

impl JsonFileStateStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = Self::read_snapshot(&path).await?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Read the facts stored at `path` without opening a store
    pub async fn read_snapshot(path: &Path) -> StoreResult<StoreSnapshot> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(StoreSnapshot::default());
        }

        let raw = tokio::fs::read_to_string(path).await?;
        let state: StoreSnapshot = serde_json::from_str(&raw)?;
        if state.schema_version != STATE_SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                expected: STATE_SCHEMA_VERSION,
                found: state.schema_version,
            });
        }
        Ok(state)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.lock().await.clone()
    }

    async fn save(&self, state: &StoreSnapshot) -> StoreResult<()> {
        let mut payload = serde_json::to_string_pretty(state)?;
        payload.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, payload).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn is_registered(&self, user: &UserId) -> StoreResult<bool> {
        Ok(self.state.lock().await.registered.contains(user))
    }

    async fn mark_registered(&self, user: &UserId) -> StoreResult<()> {
        // Lock is held across the write so saves never reorder.
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        if next.mark_registered(user) {
            self.save(&next).await?;
            *state = next;
        }
        Ok(())
    }

    async fn is_joined(&self, user: &UserId, room: &RoomId) -> StoreResult<bool> {
        Ok(self.state.lock().await.is_joined(user, room))
    }

    async fn set_membership(
        &self,
        room: &RoomId,
        user: &UserId,
        membership: Membership,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        if next.set_membership(room, user, membership) {
            self.save(&next).await?;
            *state = next;
        }
        Ok(())
    }

    async fn membership(&self, user: &UserId, room: &RoomId) -> StoreResult<Option<Membership>> {
        Ok(self.state.lock().await.membership(user, room).cloned())
    }
}
