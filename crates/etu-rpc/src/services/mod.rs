//! Typed facades over the four backend services.
//!
//! A facade borrows the [`ClientRegistry`] and nothing else. Each operation
//! fetches the service handle, attaches the caller's credential as
//! `authorization` metadata, and issues one call. Errors come back raw; use
//! [`crate::Error::normalize`] at the presentation boundary.

pub mod api_keys;
pub mod auth;
pub mod notes;
pub mod tags;

pub use api_keys::ApiKeysService;
pub use auth::AuthService;
pub use notes::NotesService;
pub use tags::TagsService;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::invoke::Method;
use crate::metadata::Metadata;
use crate::registry::ClientRegistry;

async fn unary<Req, Resp>(
    registry: &ClientRegistry,
    method: Method<Req, Resp>,
    request: &Req,
    api_key: &str,
) -> Result<Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let handle = registry.get_client(method.service());
    method
        .call(&handle, request, Metadata::authorization(api_key))
        .await
}
