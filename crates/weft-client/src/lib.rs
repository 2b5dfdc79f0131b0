//! # weft-client
//!
//! Client runtime for server-driven UIs: keeps a live connection, mirrors
//! watched remote objects, dispatches user actions and routes the replies.
//!
//! - **Connection**: [`ConnectionManager`] with fixed-delay reconnect,
//!   offline/restored signalling and acknowledgement correlation
//! - **Objects**: [`ObjectStore`], reference-counted wildcard subscriptions
//! - **Dispatch**: [`ActionDispatcher`], scope chains and in-flight status
//! - **Updates**: [`UpdateManager`], identifier-keyed component patches
//! - **Root**: [`SyncRuntime`] owns and wires all of the above
//! - **Transports**: WebSocket connector, HTTP and socket dispatch
//!
//! ```no_run
//! # async fn demo() -> weft_core::Result<()> {
//! use weft_client::SyncRuntime;
//!
//! let settings = weft_settings::load_settings().unwrap_or_default();
//! weft_client::init_logging(&settings);
//! let runtime = SyncRuntime::from_settings(settings)?;
//! runtime.start();
//! runtime.store().watch("users/*", "user-list".into(), |users| {
//!     println!("{} users", users.len());
//! })?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod connection;
pub mod dispatch;
pub mod pending;
pub mod presenter;
pub mod runtime;
pub mod session;
pub mod store;
pub mod testing;
pub mod transport;
pub mod updates;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, ObjectPush};
pub use dispatch::{ActionDispatcher, ActionStatus, DispatchOutcome, FullId, ScopeStack};
pub use pending::{Ack, PendingAck};
pub use presenter::{NullPresenter, Presenter};
pub use runtime::{SyncRuntime, SyncRuntimeBuilder, init_logging};
pub use session::SessionManager;
pub use store::ObjectStore;
pub use updates::UpdateManager;
