//! # HTTP Server
//!
//! A thin wrapper that runs an `axum` router on a pre-bound listener until
//! the application's shutdown signal fires. Both the alert API and the
//! metrics endpoint are served through it.
//!
//! On shutdown the serve future is dropped rather than drained: event
//! streams never finish on their own, so waiting for them would stall the
//! process forever. Open sessions are torn down with the runtime and their
//! cleanup guards run then.

use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, trace};

/// An HTTP server bound to an address, ready to be spawned.
pub struct HttpServer {
    name: &'static str,
    listener: TcpListener,
    router: Router,
    shutdown_rx: watch::Receiver<bool>,
}

impl HttpServer {
    /// Creates a new `HttpServer` but does not spawn it.
    ///
    /// # Arguments
    ///
    /// * `name` - Used to identify the server in logs.
    /// * `listener` - A `TcpListener` that has already been bound to an address.
    /// * `router` - The routes to serve.
    /// * `shutdown_rx` - A watch channel receiver for shutdown.
    pub fn new(
        name: &'static str,
        listener: TcpListener,
        router: Router,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            name,
            listener,
            router,
            shutdown_rx,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns a future that runs the server until a shutdown signal is received.
    pub fn run(self) -> impl Future<Output = ()> {
        let Self {
            name,
            listener,
            router,
            mut shutdown_rx,
        } = self;
        let service = router.into_make_service_with_connect_info::<SocketAddr>();

        async move {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    trace!(server = name, "Received shutdown signal.");
                }
                result = axum::serve(listener, service) => {
                    if let Err(e) = result {
                        error!(server = name, "Server error: {}", e);
                    }
                }
            }
            trace!(server = name, "Server task finished.");
        }
    }
}
