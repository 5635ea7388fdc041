//! Benchmarks for the cached provisioning gate
//!
//! Once a virtual user is registered and joined, `ensure_joined` must cost
//! a state store lookup and nothing else.
//!
//! - Cached gate with and without provisioning locks
//! - Membership lookups as the store grows
//! - First-time provisioning through the bot invite fallback

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ghostwire::intent::mock::{JoinRule, MockTransportClient};
use ghostwire::intent::{
    AppService, IntentApi, Membership, MemoryStateStore, RoomId, StateStore, UserId,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

const DOMAIN: &str = "example.org";
const BOT: &str = "bridgebot";

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn room() -> RoomId {
    RoomId::from("!abc:example.org")
}

fn homeserver() -> Arc<MockTransportClient> {
    let client = MockTransportClient::new(DOMAIN);
    client.create_room(&room(), JoinRule::Invite);
    client.add_member(&room(), &UserId::new(BOT, DOMAIN));
    Arc::new(client)
}

/// Intent that has already been provisioned into `room()`
fn provisioned_intent(rt: &Runtime, coalesce: bool) -> IntentApi<MockTransportClient> {
    let mut appservice = AppService::new(
        DOMAIN,
        BOT,
        homeserver(),
        Arc::new(MemoryStateStore::new()),
    );
    if coalesce {
        appservice = appservice.with_provisioning_locks();
    }
    let intent = appservice.new_intent("echo");
    rt.block_on(intent.ensure_joined(&room())).unwrap();
    intent
}

fn benchmark_cached_gate(c: &mut Criterion) {
    let rt = runtime();
    let intent = provisioned_intent(&rt, false);
    let room = room();

    c.bench_function("ensure_joined_cached", |b| {
        b.iter(|| rt.block_on(intent.ensure_joined(black_box(&room))).unwrap());
    });
}

fn benchmark_cached_gate_with_locks(c: &mut Criterion) {
    let rt = runtime();
    let intent = provisioned_intent(&rt, true);
    let room = room();

    c.bench_function("ensure_joined_cached_with_locks", |b| {
        b.iter(|| rt.block_on(intent.ensure_joined(black_box(&room))).unwrap());
    });
}

fn benchmark_store_scaling(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("membership_lookup_scaling");

    for users in [10, 100, 1000] {
        let store = MemoryStateStore::new();
        rt.block_on(async {
            for i in 0..users {
                let user = UserId::new(&format!("ghost{i}"), DOMAIN);
                store.mark_registered(&user).await.unwrap();
                store
                    .set_membership(&room(), &user, Membership::Join)
                    .await
                    .unwrap();
            }
        });
        let user = UserId::new(&format!("ghost{}", users / 2), DOMAIN);
        let room = room();

        group.bench_with_input(BenchmarkId::from_parameter(users), &users, |b, _| {
            b.iter(|| rt.block_on(store.is_joined(black_box(&user), black_box(&room))).unwrap());
        });
    }

    group.finish();
}

fn benchmark_first_time_provisioning(c: &mut Criterion) {
    let rt = runtime();

    c.bench_function("ensure_joined_via_bot_invite", |b| {
        b.iter_with_setup(
            || {
                AppService::new(
                    DOMAIN,
                    BOT,
                    homeserver(),
                    Arc::new(MemoryStateStore::new()),
                )
                .new_intent("echo")
            },
            |intent| rt.block_on(intent.ensure_joined(&room())).unwrap(),
        );
    });
}

criterion_group!(
    benches,
    benchmark_cached_gate,
    benchmark_cached_gate_with_locks,
    benchmark_store_scaling,
    benchmark_first_time_provisioning
);
criterion_main!(benches);
