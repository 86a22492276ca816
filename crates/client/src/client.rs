//! Top-level entry point owned by the host application.

use std::sync::Arc;

use labnotify_shared::UserId;

use crate::api_client::ApiClient;
use crate::config::NotifyConfig;
use crate::credential::Credential;
use crate::dispatcher::EventDispatcher;
use crate::poll::{NotificationSource, RestNotificationSource};
use crate::session::{Session, SessionHandle};
use crate::transport::{self, PushTransport};

type TransportFactory = Box<dyn Fn(&NotifyConfig) -> Box<dyn PushTransport> + Send + Sync>;

/// Holds at most one live session. Signing in again tears the old one down
/// first, so two users never share a connection or a dispatcher.
pub struct NotificationClient {
    config: NotifyConfig,
    transport_factory: TransportFactory,
    source: Arc<dyn NotificationSource>,
    session: Option<SessionHandle>,
}

impl NotificationClient {
    pub fn new(config: NotifyConfig) -> Self {
        let source = Arc::new(RestNotificationSource::new(ApiClient::with_timeout(
            config.api_base_url.clone(),
            config.handshake_timeout,
        )));
        Self {
            config,
            transport_factory: Box::new(transport::from_config),
            source,
            session: None,
        }
    }

    /// Build each session's transport with `factory` instead of from the config.
    pub fn with_transport_factory(
        mut self,
        factory: impl Fn(&NotifyConfig) -> Box<dyn PushTransport> + Send + Sync + 'static,
    ) -> Self {
        self.transport_factory = Box::new(factory);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn NotificationSource>) -> Self {
        self.source = source;
        self
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Start delivering `user_id`'s notifications into `dispatcher`.
    pub async fn sign_in(
        &mut self,
        user_id: UserId,
        credential: Credential,
        dispatcher: EventDispatcher,
    ) -> &SessionHandle {
        if let Some(previous) = self.session.take() {
            crate::log_info!(
                "switching notification session from user {} to {}",
                previous.user_id(),
                user_id
            );
            previous.shutdown().await;
        }

        let handle = Session::builder(self.config.clone(), user_id, credential)
            .transport((self.transport_factory)(&self.config))
            .source(self.source.clone())
            .dispatcher(dispatcher)
            .start();
        self.session.insert(handle)
    }

    /// Tear down the current session, if any.
    pub async fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            session.shutdown().await;
        }
    }
}

impl std::fmt::Debug for NotificationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationClient")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}
