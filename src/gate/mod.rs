//! Access gate: session-token authentication in front of the application routes.
//!
//! Per request: pick the scope configuration, `decision::decide`, then
//! `mutator::apply`. The only shared state is the scope table (swapped whole
//! on reload) and the identity store.

pub mod decision;
pub mod locator;
pub mod mutator;
pub mod resolver;
pub mod scope;
pub mod token;

use std::sync::Arc;

use arc_swap::ArcSwap;

pub use decision::{DenyReason, Outcome};
pub use resolver::{IdentityStore, MemoryIdentityStore, Resolution};
pub use scope::{GateConfig, ScopeTable};
pub use token::{Identity, Token};

/// Marker extension for requests generated by the server itself
/// (internal redirects, sub-requests). The gate skips them.
#[derive(Debug, Clone, Copy)]
pub struct InternalRequest;

pub struct Gate {
    scopes: ArcSwap<ScopeTable>,
    store: Arc<dyn IdentityStore>,
}

impl Gate {
    pub fn new(scopes: ScopeTable, store: Arc<dyn IdentityStore>) -> Self {
        Self {
            scopes: ArcSwap::from_pointee(scopes),
            store,
        }
    }

    /// Current scope table. In-flight requests keep the snapshot they loaded.
    pub fn scopes(&self) -> Arc<ScopeTable> {
        self.scopes.load_full()
    }

    pub fn replace_scopes(&self, scopes: ScopeTable) {
        self.scopes.store(Arc::new(scopes));
    }

    pub fn store(&self) -> &dyn IdentityStore {
        self.store.as_ref()
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("scopes", &self.scopes.load().len())
            .field("store", &self.store.backend_name())
            .finish()
    }
}
