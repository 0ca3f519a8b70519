//! TCP accept loop and server lifecycle.

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::engine::Engine;
use crate::error::{Result, Solr2Error};
use crate::session::handle_connection;
use crate::stream::{join_with_timeout, spawn_streamer};

/// Poll period of the non-blocking accept loop.
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Bound on waiting for the streaming thread at shutdown.
const STREAM_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Server {
    engine: Arc<Engine>,
    listener: TcpListener,
    stop: Arc<AtomicBool>,
    streamer: Option<JoinHandle<()>>,
}

impl Server {
    /// Bind the listener. Connections are not accepted until [`serve`](Self::serve).
    pub fn bind(engine: Arc<Engine>, addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self> {
        let listener = TcpListener::bind(&addr).map_err(|e| {
            Solr2Error::Io(std::io::Error::new(e.kind(), format!("bind {addr}: {e}")))
        })?;
        listener.set_nonblocking(true)?;
        Ok(Server {
            engine,
            listener,
            stop: Arc::new(AtomicBool::new(false)),
            streamer: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Start the streaming thread if streaming is enabled.
    pub fn start_streaming(&mut self) {
        if self.streamer.is_none() {
            self.streamer = spawn_streamer(Arc::clone(&self.engine), Arc::clone(&self.stop));
        }
    }

    /// Accept connections until `running` is cleared, one thread per session.
    pub fn serve(&self, running: &AtomicBool) -> Result<()> {
        info!("Listening on {}", self.local_addr()?);
        while running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    // Sessions use blocking I/O with timeouts.
                    if let Err(e) = stream.set_nonblocking(false) {
                        warn!("{peer}: failed to set blocking mode: {e}");
                        continue;
                    }
                    debug!("Connection from {peer}");
                    let engine = Arc::clone(&self.engine);
                    let spawned = std::thread::Builder::new()
                        .name("solr2-session".into())
                        .spawn(move || {
                            if let Err(e) = handle_connection(&engine, stream) {
                                warn!("{peer}: session failed: {e}");
                            }
                        });
                    if let Err(e) = spawned {
                        error!("Failed to spawn session thread: {e}");
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL);
                }
                Err(e) => {
                    error!("Accept error: {e}");
                    std::thread::sleep(ACCEPT_POLL);
                }
            }
        }
        Ok(())
    }

    /// Stop streaming (bounded wait), close the listener and both boards.
    pub fn shutdown(mut self) {
        info!("Shutting down...");
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.streamer.take()
            && !join_with_timeout(handle, STREAM_JOIN_TIMEOUT)
        {
            warn!("Streaming thread did not stop in time; detaching");
        }
        drop(self.listener);
        self.engine.close();
        info!("Stopped");
    }
}
