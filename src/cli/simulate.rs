use super::config::GhostwireConfig;
use ghostwire::intent::mock::{JoinRule, MockTransportClient, Operation};
use ghostwire::intent::{
    AppService, IntentApi, JsonFileStateStore, MemoryStateStore, RoomId, StateStore,
};
use ghostwire::protocol::EventList;
use std::path::PathBuf;
use std::sync::Arc;

/// Options for a simulated provisioning run
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub localpart: String,
    pub room: String,
    pub text: String,
    pub no_bot: bool,
    pub public: bool,
    pub state_file: Option<PathBuf>,
}

/// Run the provisioning flow against an in-process homeserver
///
/// The room is created invite-only (or public with `--public`) with the bridge
/// bot as its only member. The virtual user then sends one text message,
/// which registers it and joins it to the room on the way.
///
/// With `--state-file`, facts cached by earlier runs are loaded and mirrored
/// onto the homeserver first, so repeated runs show the cached fast path.
pub async fn execute(
    config: &GhostwireConfig,
    options: SimulateOptions,
) -> Result<EventList, Box<dyn std::error::Error>> {
    let domain = config.appservice.homeserver_domain.clone();
    let client = Arc::new(MockTransportClient::new(domain.clone()));
    let room = RoomId(options.room.clone());

    let rule = if options.public {
        JoinRule::Public
    } else {
        JoinRule::Invite
    };
    client.create_room(&room, rule);

    let store: Arc<dyn StateStore> = match &options.state_file {
        Some(path) => {
            let store = JsonFileStateStore::open(path).await?;
            client.seed_from(&store.snapshot().await);
            Arc::new(store)
        }
        None => Arc::new(MemoryStateStore::new()),
    };

    let mut appservice = AppService::new(
        domain.clone(),
        config.appservice.bot_localpart.clone(),
        client.clone(),
        store.clone(),
    );
    if config.provisioning.coalesce {
        appservice = appservice.with_provisioning_locks();
    }
    client.add_member(&room, &appservice.bot_user_id());

    let intent = if options.no_bot {
        IntentApi::new(options.localpart.clone(), &domain, client.clone(), store, None)
    } else {
        appservice.new_intent(&options.localpart)
    };

    println!("Acting as: {}", intent.user_id());
    println!("Room: {} ({:?})", room, rule);
    println!();

    let sent = intent.send_text(&room, &options.text).await?;

    println!("✅ Sent {}", sent.event_id);
    println!(
        "   register calls: {}, join calls: {}, invite calls: {}",
        client.calls(Operation::Register),
        client.calls(Operation::Join),
        client.calls(Operation::Invite)
    );
    println!();

    let events = EventList::new(client.sent_events(&room));
    println!("{}", serde_json::to_string_pretty(&events)?);

    Ok(events)
}
