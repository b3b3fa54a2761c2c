use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::bridge::{OutputSink, PtyOutput, SessionId, SessionOutput};
use crate::error::PtyError;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

struct Route {
    token: u64,
    sink: OutputSink,
}

type Routes = Mutex<HashMap<SessionId, Route>>;

fn lock(routes: &Routes) -> MutexGuard<'_, HashMap<SessionId, Route>> {
    routes.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Delivers each session's output to its single subscriber.
///
/// Reader threads call [`route`](Self::route); the session layer holds the
/// [`OutputSubscription`]s. Events for a session without a route are dropped.
#[derive(Clone, Default)]
pub struct OutputRouter {
    routes: Arc<Routes>,
}

impl OutputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` as the receiver of `id`'s output.
    pub fn subscribe(
        &self,
        id: SessionId,
        sink: OutputSink,
    ) -> Result<OutputSubscription, PtyError> {
        let mut routes = lock(&self.routes);
        if routes.get(&id).is_some_and(|route| !route.sink.is_closed()) {
            return Err(PtyError::AlreadySubscribed(id));
        }

        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        routes.insert(id, Route { token, sink });
        log::debug!("Output route registered for {id}");

        Ok(OutputSubscription {
            id,
            token,
            routes: Some(Arc::downgrade(&self.routes)),
        })
    }

    /// Deliver one event. Returns `false` if nobody is listening for `id`.
    pub fn route(&self, id: SessionId, event: PtyOutput) -> bool {
        let mut routes = lock(&self.routes);
        let Some(route) = routes.get(&id) else {
            return false;
        };

        if route.sink.send(SessionOutput { id, event }).is_err() {
            // Receiver is gone; nothing will ever read this route again.
            routes.remove(&id);
            return false;
        }
        true
    }

    pub fn is_subscribed(&self, id: SessionId) -> bool {
        lock(&self.routes).contains_key(&id)
    }
}

/// Handle to one session's output route.
///
/// [`cancel`](Self::cancel) removes the route synchronously: once it
/// returns, no further event for the session reaches the sink. Dropping the
/// handle cancels it.
pub struct OutputSubscription {
    id: SessionId,
    token: u64,
    routes: Option<Weak<Routes>>,
}

impl OutputSubscription {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.routes.is_some()
    }

    /// Remove the route. Safe to call more than once.
    pub fn cancel(&mut self) {
        let Some(weak) = self.routes.take() else {
            return;
        };
        let Some(routes) = weak.upgrade() else {
            return;
        };

        let mut routes = lock(&routes);
        if routes.get(&self.id).is_some_and(|route| route.token == self.token) {
            routes.remove(&self.id);
            log::debug!("Output route cancelled for {}", self.id);
        }
    }
}

impl Drop for OutputSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
