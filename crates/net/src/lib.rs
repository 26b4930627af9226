//! Enrol Network Library
//!
//! TCP front end for the join flow.
//!
//! # Architecture
//!
//! - **Server**: accepts connections and runs each join as one unit of work
//! - **Client**: sends join requests and waits for the reply
//! - **Protocol**: Length-prefixed JSON messages
//!
//! # Usage
//!
//! ```ignore
//! let server = JoinServer::start(bind, ctx).await?;
//!
//! let mut client = Client::connect(server.addr()).await?;
//! let enrolled = client.join(profile_id, "chema-1a2b-XYZ234").await?;
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod server;

pub use client::Client;
pub use error::{Error, Result};
pub use protocol::{Enrolled, JoinRole, Message, NetEnrollment, RejectKind, Rejection, SupervisorAssigned};
pub use server::{JoinServer, ServerContext};

/// Default port for join servers
pub use enrol_core::config::DEFAULT_PORT;
