use etu_types::{
    CreateApiKeyRequest, CreateApiKeyResponse, DeleteApiKeyRequest, DeleteApiKeyResponse,
    ListApiKeysRequest, ListApiKeysResponse, VerifyApiKeyRequest, VerifyApiKeyResponse,
};

use super::unary;
use crate::error::Result;
use crate::invoke::Method;
use crate::registry::{ClientRegistry, ServiceKind};

pub const CREATE_API_KEY: Method<CreateApiKeyRequest, CreateApiKeyResponse> =
    Method::new(ServiceKind::ApiKeys, "createApiKey");
pub const LIST_API_KEYS: Method<ListApiKeysRequest, ListApiKeysResponse> =
    Method::new(ServiceKind::ApiKeys, "listApiKeys");
pub const DELETE_API_KEY: Method<DeleteApiKeyRequest, DeleteApiKeyResponse> =
    Method::new(ServiceKind::ApiKeys, "deleteApiKey");
pub const VERIFY_API_KEY: Method<VerifyApiKeyRequest, VerifyApiKeyResponse> =
    Method::new(ServiceKind::ApiKeys, "verifyApiKey");

pub(crate) const METHODS: &[&str] = &[
    CREATE_API_KEY.name(),
    LIST_API_KEYS.name(),
    DELETE_API_KEY.name(),
    VERIFY_API_KEY.name(),
];

/// Management of users' personal API keys.
#[derive(Debug, Clone, Copy)]
pub struct ApiKeysService<'a> {
    registry: &'a ClientRegistry,
}

impl<'a> ApiKeysService<'a> {
    #[must_use]
    pub fn new(registry: &'a ClientRegistry) -> Self {
        Self { registry }
    }

    /// Create a key. The response carries the raw key, which cannot be fetched again.
    ///
    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn create(
        &self,
        request: &CreateApiKeyRequest,
        api_key: &str,
    ) -> Result<CreateApiKeyResponse> {
        unary(self.registry, CREATE_API_KEY, request, api_key).await
    }

    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn list(
        &self,
        request: &ListApiKeysRequest,
        api_key: &str,
    ) -> Result<ListApiKeysResponse> {
        unary(self.registry, LIST_API_KEYS, request, api_key).await
    }

    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn delete(
        &self,
        request: &DeleteApiKeyRequest,
        api_key: &str,
    ) -> Result<DeleteApiKeyResponse> {
        unary(self.registry, DELETE_API_KEY, request, api_key).await
    }

    /// Check a raw key. An unknown key is a successful call with `valid == false`.
    ///
    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn verify(
        &self,
        request: &VerifyApiKeyRequest,
        api_key: &str,
    ) -> Result<VerifyApiKeyResponse> {
        unary(self.registry, VERIFY_API_KEY, request, api_key).await
    }
}
