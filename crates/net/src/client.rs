//! TCP client for the join server

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Enrolled, JoinRole, Message, SupervisorAssigned};

/// How long to wait for a reply before giving up
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client handle; one request in flight at a time
pub struct Client {
    reader: ReadHalf<TcpStream>,
    writer: WriteHalf<TcpStream>,
}

impl Client {
    /// Connect to a join server
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        info!(addr = %addr, "Connecting to join server");

        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = tokio::io::split(stream);

        Ok(Client { reader, writer })
    }

    /// Join a section with a member code
    pub async fn join(&mut self, profile_id: Uuid, code: &str) -> Result<Enrolled> {
        let request = Message::Join {
            profile_id,
            code: code.to_string(),
            role: JoinRole::Member,
        };
        match self.request(&request).await? {
            Message::Enrolled(enrolled) => Ok(enrolled),
            other => Err(unexpected(&other)),
        }
    }

    /// Take a supervisor slot with a supervisor code
    pub async fn join_as_supervisor(&mut self, profile_id: Uuid, code: &str) -> Result<SupervisorAssigned> {
        let request = Message::Join {
            profile_id,
            code: code.to_string(),
            role: JoinRole::Supervisor,
        };
        match self.request(&request).await? {
            Message::SupervisorAssigned(assigned) => Ok(assigned),
            other => Err(unexpected(&other)),
        }
    }

    /// Send a ping and wait for the pong
    pub async fn ping(&mut self) -> Result<()> {
        match self.request(&Message::Ping).await? {
            Message::Pong => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Send one request and wait for its reply. Rejections become errors.
    async fn request(&mut self, msg: &Message) -> Result<Message> {
        let reply = tokio::time::timeout(DEFAULT_REQUEST_TIMEOUT, self.exchange(msg))
            .await
            .map_err(|_| Error::Timeout)??;

        match reply {
            Message::Rejected(rejection) => {
                debug!(kind = %rejection.kind, reason = %rejection.reason, "Request rejected");
                Err(Error::Rejected(rejection))
            }
            other => Ok(other),
        }
    }

    async fn exchange(&mut self, msg: &Message) -> Result<Message> {
        write_frame(&mut self.writer, msg).await?;
        read_frame(&mut self.reader).await
    }
}

fn unexpected(msg: &Message) -> Error {
    Error::Protocol(format!("Unexpected reply: {:?}", msg))
}
