//! Action-name request dispatch.

use rowgate_protocol::{Request, Response};
use std::collections::HashMap;

/// A registered action handler.
///
/// Handlers receive the request's `value` field and return the value placed
/// under the response's `result` key. Handlers do not produce transport
/// errors; anything they want the peer to see goes into the result value.
pub type Handler = Box<dyn Fn(&serde_json::Value) -> serde_json::Value + Send>;

/// Routes decoded requests to handlers by exact action name.
///
/// Unknown actions are not an error path: they produce a well-formed
/// response the peer can decode, and the connection proceeds to its normal
/// write-and-close lifecycle.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for an action name, replacing any previous one.
    pub fn register(&mut self, action: impl Into<String>, handler: Handler) {
        self.handlers.insert(action.into(), handler);
    }

    /// Returns the registered action names, for startup logging.
    pub fn actions(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Resolves and invokes the handler for a request.
    pub fn dispatch(&self, request: &Request) -> Response {
        match self.handlers.get(&request.action) {
            Some(handler) => Response::new(handler(&request.value)),
            None => Response::invalid_action(&request.action),
        }
    }
}
