//! Issuing one call through a service handle.
//!
//! Every call is sent exactly once. Nothing here retries: a create that timed
//! out may still have been applied, so retry policy belongs to the caller.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::registry::{ServiceClient, ServiceKind};
use crate::status::Status;

/// Call `method` by wire name on `handle`.
///
/// # Errors
///
/// Returns `Error::Configuration` without touching the network if the
/// handle's service has no such method, and `Error::Status` for every
/// transport or backend failure. A response that does not decode into
/// `Resp` is reported as an `INTERNAL` status.
pub async fn invoke<Req, Resp>(
    handle: &ServiceClient,
    method: &str,
    request: &Req,
    metadata: Metadata,
) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    if !handle.kind().has_method(method) {
        return Err(Error::Configuration {
            service: handle.kind(),
            method: method.to_string(),
        });
    }
    call(handle, method, request, metadata).await
}

async fn call<Req, Resp>(
    handle: &ServiceClient,
    method: &str,
    request: &Req,
    metadata: Metadata,
) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let params = serde_json::to_value(request)
        .map_err(|e| Status::internal(format!("failed to encode {method} request: {e}")))?;
    let path = handle.kind().path(method);

    debug!(method = %path, handle = %handle.id(), "invoking");
    let result = handle.channel().unary(&path, params, metadata).await;
    if let Err(status) = &result {
        debug!(method = %path, code = %status.code(), "call failed");
    }

    serde_json::from_value(result?)
        .map_err(|e| Error::from(Status::internal(format!("malformed {method} response: {e}"))))
}

/// A typed method descriptor: service, wire name, request and response types.
pub struct Method<Req, Resp> {
    service: ServiceKind,
    name: &'static str,
    _types: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> Clone for Method<Req, Resp> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Req, Resp> Copy for Method<Req, Resp> {}

impl<Req, Resp> fmt::Debug for Method<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({}/{})", self.service, self.name)
    }
}

impl<Req, Resp> Method<Req, Resp> {
    #[must_use]
    pub const fn new(service: ServiceKind, name: &'static str) -> Self {
        Self {
            service,
            name,
            _types: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn service(&self) -> ServiceKind {
        self.service
    }
}

impl<Req, Resp> Method<Req, Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    /// Issue this method on `handle`.
    ///
    /// # Errors
    ///
    /// Same as [`invoke`]; a handle for a different service is a configuration error.
    pub async fn call(
        &self,
        handle: &ServiceClient,
        request: &Req,
        metadata: Metadata,
    ) -> Result<Resp> {
        if handle.kind() != self.service {
            return Err(Error::Configuration {
                service: handle.kind(),
                method: self.name.to_string(),
            });
        }
        call(handle, self.name, request, metadata).await
    }
}
