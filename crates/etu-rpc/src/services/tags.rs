use etu_types::{ListTagsRequest, ListTagsResponse};

use super::unary;
use crate::error::Result;
use crate::invoke::Method;
use crate::registry::{ClientRegistry, ServiceKind};

pub const LIST_TAGS: Method<ListTagsRequest, ListTagsResponse> =
    Method::new(ServiceKind::Tags, "listTags");

pub(crate) const METHODS: &[&str] = &[LIST_TAGS.name()];

#[derive(Debug, Clone, Copy)]
pub struct TagsService<'a> {
    registry: &'a ClientRegistry,
}

impl<'a> TagsService<'a> {
    #[must_use]
    pub fn new(registry: &'a ClientRegistry) -> Self {
        Self { registry }
    }

    /// Every tag of a user, with per-tag note counts.
    ///
    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn list_tags(
        &self,
        request: &ListTagsRequest,
        api_key: &str,
    ) -> Result<ListTagsResponse> {
        unary(self.registry, LIST_TAGS, request, api_key).await
    }
}
