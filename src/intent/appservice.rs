//! Application service
//!
//! Owns what every intent shares: the homeserver domain, the bridge bot's
//! identity, the transport client and the state store. Intents are minted per
//! localpart through [`AppService::new_intent`].

use super::api::{BotIdentity, IntentApi};
use super::locks::ProvisioningLocks;
use super::state_store::StateStore;
use super::traits::{TransportClient, UserId};
use std::sync::Arc;

pub struct AppService<C: TransportClient> {
    homeserver_domain: String,
    bot_localpart: String,
    client: Arc<C>,
    state: Arc<dyn StateStore>,
    locks: Option<ProvisioningLocks>,
}

impl<C: TransportClient> AppService<C> {
    pub fn new(
        homeserver_domain: impl Into<String>,
        bot_localpart: impl Into<String>,
        client: Arc<C>,
        state: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            homeserver_domain: homeserver_domain.into(),
            bot_localpart: bot_localpart.into(),
            client,
            state,
            locks: None,
        }
    }

    /// Serialize provisioning per key for every intent minted afterwards
    pub fn with_provisioning_locks(mut self) -> Self {
        self.locks = Some(ProvisioningLocks::new());
        self
    }

    pub fn homeserver_domain(&self) -> &str {
        &self.homeserver_domain
    }

    pub fn user_id(&self, localpart: &str) -> UserId {
        UserId::new(localpart, &self.homeserver_domain)
    }

    pub fn bot_user_id(&self) -> UserId {
        self.user_id(&self.bot_localpart)
    }

    pub fn state_store(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.state)
    }

    /// Intent acting as the bridge bot itself (no invite fallback)
    pub fn bot_intent(&self) -> IntentApi<C> {
        self.new_intent(&self.bot_localpart)
    }

    /// Intent acting as `localpart`
    ///
    /// The bot is attached as invite fallback unless `localpart` is the bot.
    pub fn new_intent(&self, localpart: &str) -> IntentApi<C> {
        let bot_user_id = self.bot_user_id();
        let bot = (self.user_id(localpart) != bot_user_id).then_some(BotIdentity {
            user_id: bot_user_id,
        });

        let intent = IntentApi::new(
            localpart,
            &self.homeserver_domain,
            Arc::clone(&self.client),
            Arc::clone(&self.state),
            bot,
        );
        match &self.locks {
            Some(locks) => intent.with_locks(locks.clone()),
            None => intent,
        }
    }
}
