//! TCP join server
//!
//! Each connection reads requests in sequence and answers each one before
//! reading the next. Joins run on the blocking pool with their own database
//! connection, bounded by the configured join timeout.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use enrol_core::{Database, Deadline, EnrollmentCoordinator, SchemaCapabilities};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Enrolled, JoinRole, Message, NetEnrollment, RejectKind, Rejection, SupervisorAssigned};

/// Everything a join needs, shared by all connections
#[derive(Debug, Clone)]
pub struct ServerContext {
    /// Migrated database file; each join opens its own connection to it
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
    pub caps: SchemaCapabilities,
    pub join_timeout: Duration,
}

/// Join server handle
pub struct JoinServer {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl JoinServer {
    /// Bind and start accepting connections
    pub async fn start(bind: SocketAddr, ctx: ServerContext) -> Result<Self> {
        let listener = TcpListener::bind(bind).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, db = %ctx.db_path.display(), "Join server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        tokio::spawn(accept_loop(
            listener,
            Arc::new(ctx),
            shutdown_tx.clone(),
        ));

        Ok(JoinServer {
            addr: bound_addr,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and close idle connections
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut shutdown_rx = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            ctx.clone(),
                            shutdown_tx.subscribe(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    ctx: Arc<ServerContext>,
    shutdown_rx: broadcast::Receiver<()>,
) {
    let (reader, writer) = tokio::io::split(stream);
    match serve_requests(reader, writer, &ctx, shutdown_rx).await {
        Ok(()) | Err(Error::ConnectionClosed) => debug!(addr = %addr, "Connection closed"),
        Err(e) => warn!(addr = %addr, error = %e, "Connection dropped"),
    }
}

async fn serve_requests<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &Arc<ServerContext>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let request = tokio::select! {
            frame = read_frame(&mut reader) => frame?,
            _ = shutdown_rx.recv() => return Ok(()),
        };

        let reply = match request {
            Message::Join {
                profile_id,
                code,
                role,
            } => handle_join(ctx, profile_id, code, role).await,
            Message::Ping => Message::Pong,
            other => {
                debug!(message = ?other, "Unexpected message from client");
                Message::Rejected(Rejection {
                    kind: RejectKind::Validation,
                    reason: "unexpected message".to_string(),
                    conflict: None,
                })
            }
        };

        write_frame(&mut writer, &reply).await?;
    }
}

/// Run one join on the blocking pool and turn the outcome into a reply
#[instrument(skip(ctx, code))]
async fn handle_join(ctx: &Arc<ServerContext>, profile_id: Uuid, code: String, role: JoinRole) -> Message {
    let deadline = Deadline::after(ctx.join_timeout);
    let task_ctx = ctx.clone();
    let mut task = tokio::task::spawn_blocking(move || run_join(&task_ctx, profile_id, &code, role, deadline));

    let wait = deadline.remaining().unwrap_or(ctx.join_timeout);
    let joined = match tokio::time::timeout(wait, &mut task).await {
        Ok(joined) => joined,
        // Reply with what the task actually did; it aborts at its next deadline check
        Err(_) => {
            warn!(timeout_ms = ctx.join_timeout.as_millis() as u64, "Join timed out, waiting for task");
            task.await
        }
    };

    let outcome = joined.unwrap_or_else(|e| {
        error!(error = %e, "Join task failed");
        Err(enrol_core::Error::Cancelled)
    });

    match outcome {
        Ok(reply) => reply,
        Err(e) => {
            if !e.is_expected() {
                error!(error = %e, "Join request failed");
            }
            Message::Rejected(Rejection::from_error(&e))
        }
    }
}

fn run_join(
    ctx: &ServerContext,
    profile_id: Uuid,
    code: &str,
    role: JoinRole,
    deadline: Deadline,
) -> enrol_core::Result<Message> {
    let db = Database::connect(&ctx.db_path, ctx.busy_timeout)?;
    let coordinator = EnrollmentCoordinator::new(&db, &db, ctx.caps);

    match role {
        JoinRole::Member => {
            let receipt = coordinator.join(code, profile_id, deadline)?;
            Ok(Message::Enrolled(Enrolled {
                tenant_id: receipt.tenant_id,
                enrollment: NetEnrollment::from(&receipt.enrollment),
            }))
        }
        JoinRole::Supervisor => {
            let receipt = coordinator.join_as_supervisor(code, profile_id, deadline)?;
            Ok(Message::SupervisorAssigned(SupervisorAssigned {
                tenant_id: receipt.tenant_id,
                section_id: receipt.section_id,
                slot: receipt.slot,
            }))
        }
    }
}
