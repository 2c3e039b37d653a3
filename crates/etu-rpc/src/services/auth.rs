use etu_types::{
    AuthenticateRequest, AuthenticateResponse, GetUserByStripeCustomerIdRequest,
    GetUserByStripeCustomerIdResponse, GetUserRequest, GetUserResponse, RegisterRequest,
    RegisterResponse, UpdateUserSubscriptionRequest, UpdateUserSubscriptionResponse,
};

use super::unary;
use crate::error::Result;
use crate::invoke::Method;
use crate::registry::{ClientRegistry, ServiceKind};

pub const REGISTER: Method<RegisterRequest, RegisterResponse> =
    Method::new(ServiceKind::Auth, "register");
pub const AUTHENTICATE: Method<AuthenticateRequest, AuthenticateResponse> =
    Method::new(ServiceKind::Auth, "authenticate");
pub const GET_USER: Method<GetUserRequest, GetUserResponse> =
    Method::new(ServiceKind::Auth, "getUser");
pub const GET_USER_BY_BILLING_ID: Method<
    GetUserByStripeCustomerIdRequest,
    GetUserByStripeCustomerIdResponse,
> = Method::new(ServiceKind::Auth, "getUserByStripeCustomerId");
pub const UPDATE_USER_SUBSCRIPTION: Method<
    UpdateUserSubscriptionRequest,
    UpdateUserSubscriptionResponse,
> = Method::new(ServiceKind::Auth, "updateUserSubscription");

pub(crate) const METHODS: &[&str] = &[
    REGISTER.name(),
    AUTHENTICATE.name(),
    GET_USER.name(),
    GET_USER_BY_BILLING_ID.name(),
    UPDATE_USER_SUBSCRIPTION.name(),
];

/// Accounts, credentials and subscription state.
#[derive(Debug, Clone, Copy)]
pub struct AuthService<'a> {
    registry: &'a ClientRegistry,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub fn new(registry: &'a ClientRegistry) -> Self {
        Self { registry }
    }

    /// # Errors
    ///
    /// Returns the raw transport error of the call. An existing email
    /// surfaces as `ALREADY_EXISTS`.
    pub async fn register(
        &self,
        request: &RegisterRequest,
        api_key: &str,
    ) -> Result<RegisterResponse> {
        unary(self.registry, REGISTER, request, api_key).await
    }

    /// Check an email/password pair. Bad credentials are a successful call
    /// with `success == false`.
    ///
    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn authenticate(
        &self,
        request: &AuthenticateRequest,
        api_key: &str,
    ) -> Result<AuthenticateResponse> {
        unary(self.registry, AUTHENTICATE, request, api_key).await
    }

    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn get_user(
        &self,
        request: &GetUserRequest,
        api_key: &str,
    ) -> Result<GetUserResponse> {
        unary(self.registry, GET_USER, request, api_key).await
    }

    /// Find the user owning an external billing customer id.
    ///
    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn get_user_by_external_billing_id(
        &self,
        request: &GetUserByStripeCustomerIdRequest,
        api_key: &str,
    ) -> Result<GetUserByStripeCustomerIdResponse> {
        unary(self.registry, GET_USER_BY_BILLING_ID, request, api_key).await
    }

    /// # Errors
    ///
    /// Returns the raw transport error of the call.
    pub async fn update_user_subscription(
        &self,
        request: &UpdateUserSubscriptionRequest,
        api_key: &str,
    ) -> Result<UpdateUserSubscriptionResponse> {
        unary(self.registry, UPDATE_USER_SUBSCRIPTION, request, api_key).await
    }
}
