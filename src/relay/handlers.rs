//! Request-notification hooks
//!
//! The relay asks a connected host for its library and its track queue. The
//! frame loop that reads the player socket invokes these hooks; the client only
//! stores them and hands them out.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

/// Handler invoked when the peer requests a resource.
pub trait RequestHandler: Send + Sync {
    fn handle(&self);
}

impl<F> RequestHandler for F
where
    F: Fn() + Send + Sync,
{
    fn handle(&self) {
        self()
    }
}

/// The pair of hooks a relay client is configured with.
#[derive(Clone)]
pub struct RequestHandlers {
    library: Arc<dyn RequestHandler>,
    queue: Arc<dyn RequestHandler>,
}

impl RequestHandlers {
    pub fn new(library: Arc<dyn RequestHandler>, queue: Arc<dyn RequestHandler>) -> Self {
        Self { library, queue }
    }

    /// The peer asked for the host's library.
    pub fn library_requested(&self) {
        debug!("Dispatching library request");
        self.library.handle();
    }

    /// The peer asked for the host's track queue.
    pub fn queue_requested(&self) {
        debug!("Dispatching queue request");
        self.queue.handle();
    }
}

impl fmt::Debug for RequestHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandlers").finish_non_exhaustive()
    }
}
