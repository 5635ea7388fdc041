//! Property-based tests for the provisioning gates
//!
//! Tests for:
//! - Ensure-Joined: bounded join/invite attempts, membership recorded on success
//! - Ensure-Registered: only `M_USER_IN_USE` is absorbed

use super::api::{BotIdentity, IntentApi};
use super::mock::{JoinRule, MockTransportClient, Operation};
use super::state_store::{MemoryStateStore, StateStore};
use super::traits::{ErrorCode, RoomId, TransportError, UserId};
use proptest::prelude::*;
use std::sync::Arc;

const DOMAIN: &str = "example.org";

#[derive(Debug, Clone)]
enum Scripted {
    Forbidden,
    LimitExceeded,
    Unknown,
}

impl Scripted {
    fn error(&self) -> TransportError {
        match self {
            Self::Forbidden => TransportError::forbidden("scripted"),
            Self::LimitExceeded => TransportError::limit_exceeded("scripted"),
            Self::Unknown => TransportError::new(500, ErrorCode::Unknown, "scripted"),
        }
    }
}

fn scripted() -> impl Strategy<Value = Scripted> {
    prop_oneof![
        Just(Scripted::Forbidden),
        Just(Scripted::LimitExceeded),
        Just(Scripted::Unknown),
    ]
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    /// Property: the join gate never joins more than twice or invites more
    /// than once, and a success always leaves the membership cached
    #[test]
    fn ensure_joined_is_bounded(
        join_failures in prop::collection::vec(scripted(), 0..4),
        invite_failure in prop::option::of(scripted()),
        has_bot in any::<bool>(),
        public_room in any::<bool>(),
    ) {
        let room = RoomId::from("!abc:example.org");
        let bot = UserId::new("bridgebot", DOMAIN);
        let client = Arc::new(MockTransportClient::new(DOMAIN));
        let rule = if public_room { JoinRule::Public } else { JoinRule::Invite };
        client.create_room(&room, rule);
        client.add_member(&room, &bot);
        for failure in &join_failures {
            client.fail_next(Operation::Join, failure.error());
        }
        if let Some(failure) = &invite_failure {
            client.fail_next(Operation::Invite, failure.error());
        }

        let store = Arc::new(MemoryStateStore::new());
        let intent = IntentApi::new(
            "echo",
            DOMAIN,
            client.clone(),
            store.clone(),
            has_bot.then(|| BotIdentity { user_id: bot.clone() }),
        );

        let result = block_on(intent.ensure_joined(&room));
        let joined = block_on(store.is_joined(intent.user_id(), &room)).unwrap();

        prop_assert!(client.calls(Operation::Join) <= 2);
        prop_assert!(client.calls(Operation::Invite) <= 1);
        prop_assert_eq!(result.is_ok(), joined);
        if client.calls(Operation::Invite) == 1 {
            prop_assert!(has_bot, "invite attempted without a bot");
        }
        if !has_bot {
            prop_assert_eq!(client.calls(Operation::Invite), 0);
        }
    }

    /// Property: registration succeeds exactly when the homeserver accepts it
    /// or reports the user already exists
    #[test]
    fn ensure_registered_absorbs_only_user_in_use(
        preregistered in any::<bool>(),
        failure in prop::option::of(scripted()),
    ) {
        let client = Arc::new(MockTransportClient::new(DOMAIN));
        if preregistered {
            client.register_user("echo");
        }
        if let Some(failure) = &failure {
            client.fail_next(Operation::Register, failure.error());
        }

        let store = Arc::new(MemoryStateStore::new());
        let intent = IntentApi::new("echo", DOMAIN, client.clone(), store.clone(), None);

        let result = block_on(intent.ensure_registered());
        let registered = block_on(store.is_registered(intent.user_id())).unwrap();

        prop_assert_eq!(result.is_ok(), failure.is_none());
        prop_assert_eq!(registered, failure.is_none());
        prop_assert_eq!(client.calls(Operation::Register), 1);
    }
}
