//! `SyncRuntime`: the root context.
//!
//! One runtime is built per process. It owns one instance of every
//! component and wires them together:
//!
//! | connection event      | routed to                                   |
//! |-----------------------|---------------------------------------------|
//! | object push           | [`ObjectStore::apply`]                      |
//! | (re)connected         | [`ObjectStore::resubscribe_all`]            |
//! | connectivity change   | [`Presenter::connectivity_changed`]         |
//! | unparseable frame     | generic error notice                        |
//! | server error ack      | error notice with the server's message      |
//! | fatal error           | error notice, manager stopped               |
//!
//! Connection callbacks hold weak references to the store, so dropping
//! the runtime frees every component.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use weft_core::errors::Result;
use weft_core::protocol::{ActionKey, Notice};
use weft_core::{ListenerId, SessionId, SyncError};
use weft_settings::ClientSettings;

use crate::connection::{ConnectionConfig, ConnectionManager};
use crate::dispatch::{ActionDispatcher, DispatchOutcome, ScopeStack};
use crate::presenter::{NullPresenter, Presenter};
use crate::session::SessionManager;
use crate::store::ObjectStore;
use crate::transport::{
    Connector, DispatchTransport, HttpTransport, SocketTransport, WebSocketConnector,
};
use crate::updates::UpdateManager;

/// Notice shown when a server frame cannot be decoded.
pub const PARSE_FAILURE_NOTICE: &str = "Failed to parse information from server";

const OWNER: &str = "runtime";

/// Install the global subscriber described by `settings.logging`.
pub fn init_logging(settings: &ClientSettings) {
    weft_core::logging::init_subscriber_with_format(
        &settings.logging.level,
        settings.logging.format,
    );
}

/// Builder for [`SyncRuntime`]. Unset collaborators get production defaults.
pub struct SyncRuntimeBuilder {
    settings: ClientSettings,
    connector: Option<Arc<dyn Connector>>,
    transport: Option<Arc<dyn DispatchTransport>>,
    presenter: Option<Arc<dyn Presenter>>,
    session_id: Option<SessionId>,
}

impl SyncRuntimeBuilder {
    /// Use `connector` instead of [`WebSocketConnector`].
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Use `transport` for dispatches instead of the configured one.
    #[must_use]
    pub fn dispatch_transport(mut self, transport: Arc<dyn DispatchTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Show notices and updates through `presenter`.
    #[must_use]
    pub fn presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Resume a known session instead of creating one lazily.
    #[must_use]
    pub fn session_id(mut self, id: SessionId) -> Self {
        self.session_id = Some(id);
        self
    }

    /// Validate settings and assemble the runtime.
    ///
    /// Without an explicit transport, dispatches go over HTTP when a
    /// dispatch URL is configured and over the socket otherwise.
    pub fn build(self) -> Result<SyncRuntime> {
        let Self {
            settings,
            connector,
            transport,
            presenter,
            session_id,
        } = self;
        settings
            .validate()
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        let connector = connector.unwrap_or_else(|| Arc::new(WebSocketConnector));
        let presenter = presenter.unwrap_or_else(|| Arc::new(NullPresenter));
        let session = Arc::new(session_id.map_or_else(SessionManager::new, SessionManager::with_id));

        let connection =
            ConnectionManager::new(connector, ConnectionConfig::from(&settings.connection));
        let store = Arc::new(ObjectStore::new(Arc::new(connection.clone())));
        let updates = Arc::new(UpdateManager::new());

        let transport: Arc<dyn DispatchTransport> = match transport {
            Some(transport) => transport,
            None if settings.dispatch.url.is_some() => {
                Arc::new(HttpTransport::new(&settings.dispatch)?)
            }
            None => Arc::new(SocketTransport::new(
                connection.clone(),
                settings.dispatch.event_object_id.clone(),
            )),
        };
        let dispatcher = Arc::new(ActionDispatcher::new(
            Arc::clone(&session),
            transport,
            Arc::clone(&presenter),
            Arc::clone(&updates),
        ));

        let runtime = SyncRuntime {
            settings: Arc::new(settings),
            session,
            connection,
            store,
            updates,
            dispatcher,
            presenter,
        };
        runtime.wire()?;
        debug!(endpoint = %runtime.settings.connection.endpoint, "runtime built");
        Ok(runtime)
    }
}

/// Handle to the runtime. Cheap to clone; pass it to the UI layer.
#[derive(Clone)]
pub struct SyncRuntime {
    settings: Arc<ClientSettings>,
    session: Arc<SessionManager>,
    connection: ConnectionManager,
    store: Arc<ObjectStore>,
    updates: Arc<UpdateManager>,
    dispatcher: Arc<ActionDispatcher>,
    presenter: Arc<dyn Presenter>,
}

impl SyncRuntime {
    /// Start building a runtime from `settings`.
    pub fn builder(settings: ClientSettings) -> SyncRuntimeBuilder {
        SyncRuntimeBuilder {
            settings,
            connector: None,
            transport: None,
            presenter: None,
            session_id: None,
        }
    }

    /// Runtime with production collaborators.
    pub fn from_settings(settings: ClientSettings) -> Result<Self> {
        Self::builder(settings).build()
    }

    fn wire(&self) -> Result<()> {
        let owner = ListenerId::from(OWNER);

        let store = Arc::downgrade(&self.store);
        self.connection.on_message().listen(owner.clone(), move |push| {
            if let Some(store) = store.upgrade() {
                store.apply(push);
            }
        })?;

        let store = Arc::downgrade(&self.store);
        self.connection
            .on_connected()
            .listen(owner.clone(), move |generation: &u64| {
                if let Some(store) = store.upgrade() {
                    let replayed = store.resubscribe_all();
                    debug!(generation, replayed, "watches replayed after connect");
                }
            })?;

        let presenter = Arc::clone(&self.presenter);
        self.connection
            .on_connectivity_change()
            .listen(owner.clone(), move |online: &bool| {
                presenter.connectivity_changed(*online);
            })?;

        let presenter = Arc::clone(&self.presenter);
        self.connection
            .on_error()
            .listen(owner.clone(), move |err: &SyncError| match err {
                SyncError::MalformedMessage(_) => {
                    presenter.notice(Notice::error(PARSE_FAILURE_NOTICE));
                }
                SyncError::Application { message, .. } => {
                    presenter.notice(Notice::error(message.clone()));
                }
                other => debug!(error = %other, "connection error not shown"),
            })?;

        let presenter = Arc::clone(&self.presenter);
        self.connection
            .on_fatal_error()
            .listen(owner, move |err: &SyncError| {
                presenter.notice(Notice::error(format!("Connection stopped: {err}")));
            })?;
        Ok(())
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Connect to the configured endpoint in the background.
    pub fn start(&self) {
        info!(endpoint = %self.settings.connection.endpoint, "starting sync runtime");
        self.connection.start(self.settings.connection.endpoint.clone());
    }

    /// Close the connection and fail outstanding requests.
    pub async fn stop(&self) {
        self.connection.stop().await;
        info!("sync runtime stopped");
    }

    // ─── Dispatch ────────────────────────────────────────────────────────

    /// Dispatch `action` inside `scope`. See [`ActionDispatcher::dispatch`].
    pub async fn emit_event(
        &self,
        scope: &ScopeStack,
        action: Option<&ActionKey>,
        payload: Option<Value>,
    ) -> Result<DispatchOutcome> {
        self.dispatcher.dispatch(scope, action, payload).await
    }

    // ─── Components ──────────────────────────────────────────────────────

    /// Effective settings.
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Session identity.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// The connection.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Watched objects.
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Component patch routing.
    pub fn updates(&self) -> &UpdateManager {
        &self.updates
    }

    /// Action dispatch and status.
    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }
}
