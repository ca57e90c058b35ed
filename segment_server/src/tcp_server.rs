use crate::catalog::{self, Catalog};
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::session::{Session, SessionContext};
use crate::shutdown::ShutdownSignal;
use segment_protocol::{Connection, ErrorKind, Message};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Poll interval of the accept loop while no client is waiting
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// TCP segment server: accepts connections and runs one session thread each
pub struct SegmentServer {
    config: ServerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    context: SessionContext,
    shutdown: ShutdownSignal,
    connection_count: Arc<AtomicUsize>,
}

impl SegmentServer {
    /// Persist the catalog snapshot and bind the listening socket.
    ///
    /// Sessions answer `list` from the snapshot file as written here.
    /// Nothing is accepted until `run`.
    pub fn bind(config: ServerConfig, catalog: Catalog) -> Result<Self> {
        catalog.persist(&config.metadata_file)?;
        let snapshot = catalog::load_snapshot(&config.metadata_file)?;

        let listener = TcpListener::bind(&config.bind_address)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let shutdown = ShutdownSignal::new();
        let context = SessionContext::new(
            Arc::new(catalog),
            &snapshot,
            shutdown.clone(),
            config.chunk_size,
        )?;

        log::info!(
            "🎵 Segment server listening on {} ({} audio files)",
            local_addr,
            context.catalog.len()
        );

        Ok(Self {
            config,
            listener,
            local_addr,
            context,
            shutdown,
            connection_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for stopping the server from elsewhere (signal handler, tests)
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn active_connections(&self) -> usize {
        self.connection_count.load(Ordering::SeqCst)
    }

    /// Accept connections until the shutdown signal is set (blocking).
    ///
    /// The listener is closed when this returns. Sessions that are still
    /// running are left to finish on their own threads.
    pub fn run(self) -> Result<()> {
        while !self.shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, addr)) => self.admit(stream, addr),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    // No connections available, sleep briefly
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if self.shutdown.is_triggered() => {
                    log::debug!("Accept error during shutdown: {}", e);
                }
                Err(e) => {
                    log::error!("Failed to accept connection: {}", e);
                    thread::sleep(Duration::from_millis(100));
                }
            }
        }

        log::info!(
            "🛑 Server shutting down ({} sessions still active)",
            self.active_connections()
        );
        drop(self.listener);
        log::info!("🛑 Listener on {} closed", self.local_addr);
        Ok(())
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self) -> Result<ServerHandle> {
        let local_addr = self.local_addr;
        let shutdown = self.shutdown_signal();

        let thread = thread::Builder::new()
            .name("segment-dispatcher".to_string())
            .spawn(move || self.run())?;

        Ok(ServerHandle {
            local_addr,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Hand an accepted stream to a session unless shutdown was signalled
    /// after the loop last checked
    fn admit(&self, stream: TcpStream, addr: SocketAddr) {
        if self.shutdown.is_triggered() {
            log::debug!("Dropping connection from {}: shutting down", addr);
            return;
        }
        self.dispatch(stream, addr);
    }

    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        let current_connections = self.connection_count.load(Ordering::SeqCst);
        if current_connections >= self.config.max_connections {
            log::warn!(
                "⚠️  Rejecting connection from {}: too many connections ({}/{})",
                addr,
                current_connections,
                self.config.max_connections
            );
            Self::reject(stream, self.config.max_connections);
            return;
        }

        // Accepted sockets may inherit non-blocking mode from the listener
        if let Err(e) = stream.set_nonblocking(false) {
            log::error!("Failed to configure connection from {}: {}", addr, e);
            return;
        }

        log::info!(
            "🔌 New connection from {} ({}/{})",
            addr,
            current_connections + 1,
            self.config.max_connections
        );

        self.connection_count.fetch_add(1, Ordering::SeqCst);

        let connection_count = Arc::clone(&self.connection_count);
        let context = self.context.clone();

        let spawned = thread::Builder::new()
            .name(format!("session-{}", addr))
            .spawn(move || {
                match Session::new(stream, context) {
                    Ok(session) => session.run(),
                    Err(e) => log::error!("Connection error: {}", e),
                }

                connection_count.fetch_sub(1, Ordering::SeqCst);
                log::info!("🔌 Connection from {} closed", addr);
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn session for {}: {}", addr, e);
            self.connection_count.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn reject(stream: TcpStream, max: usize) {
        let _ = stream.set_nonblocking(false);
        if let Ok(mut conn) = Connection::new(stream) {
            let error = ServerError::TooManyConnections { max };
            let _ = conn.write_message(&Message::error(ErrorKind::Busy, error.to_string()));
        }
    }
}

/// Handle for a server running in the background
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: ShutdownSignal,
    thread: Option<thread::JoinHandle<Result<()>>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn address(&self) -> String {
        self.local_addr.to_string()
    }

    /// Ask the accept loop to stop
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Wait for the accept loop to exit
    pub fn join(mut self) -> Result<()> {
        self.wait()
    }

    fn wait(&mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or_else(|_| {
                Err(ServerError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "dispatcher thread panicked",
                )))
            }),
            None => Ok(()),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
        if let Err(e) = self.wait() {
            log::error!("Segment server exited with error: {}", e);
        }
    }
}
