//! Process-wide cache of service handles.
//!
//! The registry is the only place that creates channels. It keeps one slot
//! per [`ServiceKind`] and hands out the cached handle while it stays usable.
//! A handle whose channel has been shut down is replaced on the next
//! [`ClientRegistry::get_client`].
//!
//! Slots are [`ArcSwapOption`]s: readers never block, and the only mutation
//! is swapping in a new handle. Two callers that race on an empty slot may
//! each build a handle. The last store wins and both handles work, so no lock
//! is taken.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{debug, info};
use uuid::Uuid;

use crate::channel::{Channel, ChannelOptions, ConnectivityState};
use crate::config::ClientConfig;
use crate::credentials::ChannelCredentials;
use crate::health::is_usable;
use crate::services::{self, ApiKeysService, AuthService, NotesService, TagsService};

/// The logical backend services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Notes,
    Tags,
    Auth,
    ApiKeys,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Notes,
        ServiceKind::Tags,
        ServiceKind::Auth,
        ServiceKind::ApiKeys,
    ];

    /// Service name as it appears in method paths.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Notes => "NotesService",
            ServiceKind::Tags => "TagsService",
            ServiceKind::Auth => "AuthService",
            ServiceKind::ApiKeys => "ApiKeysService",
        }
    }

    /// Wire names of every method this service defines.
    #[must_use]
    pub fn methods(self) -> &'static [&'static str] {
        match self {
            ServiceKind::Notes => services::notes::METHODS,
            ServiceKind::Tags => services::tags::METHODS,
            ServiceKind::Auth => services::auth::METHODS,
            ServiceKind::ApiKeys => services::api_keys::METHODS,
        }
    }

    #[must_use]
    pub fn has_method(self, method: &str) -> bool {
        self.methods().contains(&method)
    }

    /// Full method path, e.g. `/etu.NotesService/listNotes`.
    #[must_use]
    pub fn path(self, method: &str) -> String {
        format!("/etu.{}/{method}", self.name())
    }

    fn index(self) -> usize {
        match self {
            ServiceKind::Notes => 0,
            ServiceKind::Tags => 1,
            ServiceKind::Auth => 2,
            ServiceKind::ApiKeys => 3,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A connected client for one service.
///
/// Immutable once built. When its channel shuts down the registry discards
/// it and builds a fresh one.
#[derive(Debug)]
pub struct ServiceClient {
    id: Uuid,
    kind: ServiceKind,
    channel: Channel,
}

impl ServiceClient {
    /// Build a handle for `kind` against the configured endpoint.
    ///
    /// Does no I/O; the channel connects on the first call.
    #[must_use]
    pub fn new(kind: ServiceKind, config: &ClientConfig) -> Self {
        let credentials = ChannelCredentials::from_flag(config.encrypted_transport());
        let channel = Channel::new(
            config.endpoint.clone(),
            credentials,
            ChannelOptions::from(config),
        );
        Self {
            id: Uuid::new_v4(),
            kind,
            channel,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    #[must_use]
    pub fn state(&self) -> ConnectivityState {
        self.channel.state()
    }

    /// Shut the handle's channel down. The handle is unusable afterwards.
    pub fn close(&self) {
        self.channel.close();
    }
}

/// Cache of one [`ServiceClient`] per service.
pub struct ClientRegistry {
    config: ClientConfig,
    slots: [ArcSwapOption<ServiceClient>; 4],
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached: Vec<_> = ServiceKind::ALL
            .iter()
            .filter(|kind| self.slots[kind.index()].load().is_some())
            .collect();
        f.debug_struct("ClientRegistry")
            .field("config", &self.config)
            .field("cached", &cached)
            .finish()
    }
}

impl ClientRegistry {
    /// Create a registry with every slot empty.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            slots: std::array::from_fn(|_| ArcSwapOption::empty()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Cached handle for `kind`, built on first use and rebuilt after shutdown.
    #[must_use]
    pub fn get_client(&self, kind: ServiceKind) -> Arc<ServiceClient> {
        let slot = &self.slots[kind.index()];

        let cached = slot.load_full();
        if let Some(handle) = &cached
            && is_usable(Some(handle.as_ref()))
        {
            return Arc::clone(handle);
        }

        let handle = Arc::new(ServiceClient::new(kind, &self.config));
        if cached.is_some() {
            info!(service = %kind, handle = %handle.id(), "replacing shut-down client");
        } else {
            info!(
                service = %kind,
                handle = %handle.id(),
                endpoint = %self.config.endpoint,
                encrypted = handle.channel().credentials().is_encrypted(),
                "created client"
            );
        }
        slot.store(Some(Arc::clone(&handle)));
        handle
    }

    /// Close and drop every cached handle.
    pub fn reset(&self) {
        for kind in ServiceKind::ALL {
            self.reset_service(kind);
        }
    }

    /// Close and drop the cached handle for `kind`, if any.
    pub fn reset_service(&self, kind: ServiceKind) {
        if let Some(old) = self.slots[kind.index()].swap(None) {
            debug!(service = %kind, handle = %old.id(), "resetting client");
            old.close();
        }
    }

    #[must_use]
    pub fn notes(&self) -> NotesService<'_> {
        NotesService::new(self)
    }

    #[must_use]
    pub fn tags(&self) -> TagsService<'_> {
        TagsService::new(self)
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self)
    }

    #[must_use]
    pub fn api_keys(&self) -> ApiKeysService<'_> {
        ApiKeysService::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Endpoint, Environment};

    fn registry() -> ClientRegistry {
        ClientRegistry::new(ClientConfig::default().with_endpoint(Endpoint::new("127.0.0.1", 1)))
    }

    #[test]
    fn test_first_get_creates_handle() {
        let registry = registry();
        let handle = registry.get_client(ServiceKind::Notes);
        assert_eq!(handle.kind(), ServiceKind::Notes);
        assert_eq!(handle.state(), ConnectivityState::Idle);
    }

    #[test]
    fn test_usable_handle_is_reused() {
        let registry = registry();
        let first = registry.get_client(ServiceKind::Tags);
        let second = registry.get_client(ServiceKind::Tags);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_transient_failure_handle_is_reused() {
        let registry = registry();
        let first = registry.get_client(ServiceKind::Auth);
        first.channel().transition(ConnectivityState::TransientFailure);
        let second = registry.get_client(ServiceKind::Auth);
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn test_shutdown_handle_is_replaced() {
        let registry = registry();
        let first = registry.get_client(ServiceKind::ApiKeys);
        first.close();

        let second = registry.get_client(ServiceKind::ApiKeys);
        assert_ne!(first.id(), second.id());
        assert_ne!(second.state(), ConnectivityState::Shutdown);
    }

    #[test]
    fn test_slots_are_per_service() {
        let registry = registry();
        let notes = registry.get_client(ServiceKind::Notes);
        let tags = registry.get_client(ServiceKind::Tags);
        assert_ne!(notes.id(), tags.id());

        notes.close();
        assert_eq!(registry.get_client(ServiceKind::Tags).id(), tags.id());
    }

    #[test]
    fn test_reset_closes_and_clears() {
        let registry = registry();
        let notes = registry.get_client(ServiceKind::Notes);
        let auth = registry.get_client(ServiceKind::Auth);

        registry.reset();
        assert_eq!(notes.state(), ConnectivityState::Shutdown);
        assert_eq!(auth.state(), ConnectivityState::Shutdown);
        assert_ne!(registry.get_client(ServiceKind::Notes).id(), notes.id());
    }

    #[test]
    fn test_reset_service_leaves_others() {
        let registry = registry();
        let notes = registry.get_client(ServiceKind::Notes);
        let tags = registry.get_client(ServiceKind::Tags);

        registry.reset_service(ServiceKind::Notes);
        assert_eq!(notes.state(), ConnectivityState::Shutdown);
        assert_eq!(registry.get_client(ServiceKind::Tags).id(), tags.id());
    }

    #[test]
    fn test_handle_credentials_follow_config() {
        let prod = ClientRegistry::new(ClientConfig::for_environment(Environment::Production));
        assert!(
            prod.get_client(ServiceKind::Notes)
                .channel()
                .credentials()
                .is_encrypted()
        );

        let mut config = ClientConfig::for_environment(Environment::Production);
        config.use_encrypted_transport = Some(false);
        let overridden = ClientRegistry::new(config);
        assert!(
            !overridden
                .get_client(ServiceKind::Notes)
                .channel()
                .credentials()
                .is_encrypted()
        );
    }

    #[test]
    fn test_concurrent_first_use_yields_usable_handles() {
        let registry = Arc::new(registry());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get_client(ServiceKind::Notes))
            })
            .collect();

        for t in threads {
            let handle = t.join().unwrap();
            assert!(is_usable(Some(handle.as_ref())));
        }
        assert!(is_usable(Some(registry.get_client(ServiceKind::Notes).as_ref())));
    }

    #[test]
    fn test_method_paths() {
        assert_eq!(
            ServiceKind::Notes.path("listNotes"),
            "/etu.NotesService/listNotes"
        );
        assert_eq!(
            ServiceKind::ApiKeys.path("verifyApiKey"),
            "/etu.ApiKeysService/verifyApiKey"
        );
    }

    #[test]
    fn test_method_tables() {
        assert!(ServiceKind::Notes.has_method("createNote"));
        assert!(ServiceKind::Auth.has_method("getUserByStripeCustomerId"));
        assert!(!ServiceKind::Tags.has_method("createNote"));
        assert!(!ServiceKind::ApiKeys.has_method(""));
    }
}
