use std::sync::Arc;

use crate::relay::MessageRouter;

/// Shared handler state. The router owns the session registry and room
/// directory; everything the route layer needs goes through it.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<MessageRouter>,
}
