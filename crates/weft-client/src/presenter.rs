//! The rendering collaborator.
//!
//! The runtime never renders anything itself. Notices, whole-tree
//! replacements and connectivity changes are handed to a [`Presenter`]
//! supplied by the UI layer.

use serde_json::Value;
use tracing::{debug, info};
use weft_core::protocol::Notice;

/// Receives everything the runtime wants shown.
///
/// Methods are called from runtime tasks and must not block.
pub trait Presenter: Send + Sync {
    /// Show a transient notice.
    fn notice(&self, notice: Notice);

    /// Replace the whole rendered tree with `root`.
    fn full_update(&self, root: Value);

    /// The server became unreachable (`false`) or reachable again (`true`).
    fn connectivity_changed(&self, has_internet: bool) {
        debug!(has_internet, "connectivity changed");
    }
}

/// Presenter that only logs. Used when the UI layer supplies none.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn notice(&self, notice: Notice) {
        info!(level = ?notice.level, message = %notice.message, "notice");
    }

    fn full_update(&self, _root: Value) {
        debug!("full update discarded");
    }
}
