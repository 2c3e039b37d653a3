//! RPC client layer for the Etu notes backend.
//!
//! The crate turns typed calls into framed JSON-RPC requests on a cached,
//! self-healing channel per service, and classifies failures for display.
//!
//! # Architecture
//!
//! - [`credentials`]: transport security chosen from the deployment environment
//! - [`channel`]: one multiplexed connection per handle, with observable state
//! - [`health`]: side-effect-free usability check for cached handles
//! - [`registry`]: the process-wide handle cache
//! - [`invoke`]: issuing exactly one call through a handle
//! - [`services`]: typed facades for the Notes, Tags, Auth and API key services
//! - [`error`]: transport status to user-safe error mapping
//! - [`protocol`] / [`transport`]: JSON-RPC 2.0 messages and the length-prefixed codec
//!
//! # Example
//!
//! ```no_run
//! use etu_rpc::{ClientConfig, ClientRegistry};
//! use etu_types::ListNotesRequest;
//!
//! # async fn example() -> Result<(), etu_rpc::Error> {
//! let registry = ClientRegistry::new(ClientConfig::from_env()?);
//!
//! let request = ListNotesRequest::for_user("user-1");
//! match registry.notes().list_notes(&request, "service-key").await {
//!     Ok(resp) => println!("{} notes", resp.total),
//!     Err(e) => eprintln!("{}", e.normalize()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod credentials;
pub mod error;
pub mod health;
pub mod invoke;
pub mod metadata;
pub mod protocol;
pub mod registry;
pub mod services;
pub mod status;
pub mod transport;

pub use channel::{Channel, ChannelOptions, ConnectivityState};
pub use config::{ClientConfig, Endpoint, Environment};
pub use credentials::{ChannelCredentials, credentials};
pub use error::{DomainError, Error, ErrorKind, Result, normalize};
pub use health::is_usable;
pub use invoke::{Method, invoke};
pub use metadata::{AUTHORIZATION, Metadata};
pub use protocol::{Message, Request, RequestId, Response, RpcError};
pub use registry::{ClientRegistry, ServiceClient, ServiceKind};
pub use services::{ApiKeysService, AuthService, NotesService, TagsService};
pub use status::{Code, Status};
pub use transport::{CodecError, FrameCodec};
