//! # weft-core
//!
//! Foundation types for the weft synchronization and dispatch runtime.
//!
//! - **Branded IDs**: [`SessionId`], [`RequestId`], [`ListenerId`]
//! - **Errors**: the [`SyncError`] hierarchy with connectivity/protocol/fatal
//!   classification
//! - **Paths**: [`path::matches`] and [`ObjectPattern`] for wildcard
//!   subscriptions
//! - **Listeners**: [`ListenerRegistry`], the single/multi pub/sub cell every
//!   runtime component routes through
//! - **Protocol**: socket frames, dispatch envelopes and reply types
//! - **Logging**: subscriber setup and test capture

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod listeners;
pub mod logging;
pub mod path;
pub mod protocol;

pub use errors::{Result, SyncError};
pub use ids::{ListenerId, RequestId, SessionId};
pub use listeners::{ListenerFn, ListenerMode, ListenerRegistry};
pub use path::ObjectPattern;
pub use protocol::{
    ActionKey, ClientMessage, DispatchEnvelope, DispatchReply, Notice, NoticeLevel, ReplyAction,
    ScopeFrame, ServerMessage, UpdateAction,
};
