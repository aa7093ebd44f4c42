//! Remote API access: transport, authenticated client and typed facades

#![allow(dead_code)]

pub mod admin;
pub mod client;
pub mod error;
pub mod transport;
pub mod user;

pub use admin::AdminApi;
pub use client::{ApiClient, AuthEndpoints, ClearReason, SessionEvent};
pub use error::{ApiError, SubmitError};
pub use transport::{HttpTransport, ReqwestTransport};
pub use user::UserApi;
