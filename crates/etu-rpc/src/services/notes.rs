use etu_types::{
    CreateNoteRequest, CreateNoteResponse, DeleteNoteRequest, DeleteNoteResponse,
    GetNoteRequest, GetNoteResponse, ListNotesRequest, ListNotesResponse, UpdateNoteRequest,
    UpdateNoteResponse,
};

use super::unary;
use crate::error::Result;
use crate::invoke::Method;
use crate::registry::{ClientRegistry, ServiceKind};

pub const LIST_NOTES: Method<ListNotesRequest, ListNotesResponse> =
    Method::new(ServiceKind::Notes, "listNotes");
pub const CREATE_NOTE: Method<CreateNoteRequest, CreateNoteResponse> =
    Method::new(ServiceKind::Notes, "createNote");
pub const GET_NOTE: Method<GetNoteRequest, GetNoteResponse> =
    Method::new(ServiceKind::Notes, "getNote");
pub const UPDATE_NOTE: Method<UpdateNoteRequest, UpdateNoteResponse> =
    Method::new(ServiceKind::Notes, "updateNote");
pub const DELETE_NOTE: Method<DeleteNoteRequest, DeleteNoteResponse> =
    Method::new(ServiceKind::Notes, "deleteNote");

pub(crate) const METHODS: &[&str] = &[
    LIST_NOTES.name(),
    CREATE_NOTE.name(),
    GET_NOTE.name(),
    UPDATE_NOTE.name(),
    DELETE_NOTE.name(),
];

/// Note CRUD and search.
#[derive(Debug, Clone, Copy)]
pub struct NotesService<'a> {
    registry: &'a ClientRegistry,
}

impl<'a> NotesService<'a> {
    #[must_use]
    pub fn new(registry: &'a ClientRegistry) -> Self {
        Self { registry }
    }

    /// List a user's notes, filtered by search text, tags and date range.
    ///
    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn list_notes(
        &self,
        request: &ListNotesRequest,
        api_key: &str,
    ) -> Result<ListNotesResponse> {
        unary(self.registry, LIST_NOTES, request, api_key).await
    }

    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn create_note(
        &self,
        request: &CreateNoteRequest,
        api_key: &str,
    ) -> Result<CreateNoteResponse> {
        unary(self.registry, CREATE_NOTE, request, api_key).await
    }

    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn get_note(
        &self,
        request: &GetNoteRequest,
        api_key: &str,
    ) -> Result<GetNoteResponse> {
        unary(self.registry, GET_NOTE, request, api_key).await
    }

    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn update_note(
        &self,
        request: &UpdateNoteRequest,
        api_key: &str,
    ) -> Result<UpdateNoteResponse> {
        unary(self.registry, UPDATE_NOTE, request, api_key).await
    }

    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn delete_note(
        &self,
        request: &DeleteNoteRequest,
        api_key: &str,
    ) -> Result<DeleteNoteResponse> {
        unary(self.registry, DELETE_NOTE, request, api_key).await
    }
}
