//! Alpine Guardian Backend - Client for the hosted backend-as-a-service.
//!
//! The hosted backend is the source of truth for everything except the cart:
//! products, orders, reviews, accounts and site settings live in its
//! relational tables, sign-in goes through its auth service, payments and
//! role changes through its serverless functions, and product templates
//! through its object storage.
//!
//! # Modules
//!
//! - [`rest`] - Relational REST dialect (filters, typed tables)
//! - [`data`] - Data access facade over the five tables, with an optional read cache
//! - [`auth`] - Password sign-in, sign-up, recovery and token refresh
//! - [`roles`] - Role resolution with the account side-table presence memo
//! - [`context`] - Per-visitor auth context stored in the browsing session
//! - [`functions`] - Checkout session, role change and user directory functions
//! - [`storage`] - Product template uploads

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod functions;
mod http;
pub mod rest;
pub mod roles;
pub mod storage;

use std::time::Duration;

pub use auth::{AuthClient, AuthSession, AuthUser};
pub use config::{BackendConfig, ConfigError, RoleSource};
pub use context::{AuthContext, AuthEvent};
pub use data::DataClient;
pub use error::BackendError;
pub use functions::FunctionsClient;
pub use roles::RoleResolver;
pub use storage::StorageClient;

use http::Transport;

/// Every client for one hosted project, sharing a single connection pool.
#[derive(Clone)]
pub struct Backend {
    pub data: DataClient,
    pub auth: AuthClient,
    pub roles: RoleResolver,
    pub functions: FunctionsClient,
    pub storage: StorageClient,
}

impl Backend {
    /// Build all clients. `cache_ttl` enables the facade's read cache; pass
    /// `None` where reads must always hit the tables.
    #[must_use]
    pub fn new(config: &BackendConfig, cache_ttl: Option<Duration>) -> Self {
        let transport = Transport::new(config);
        let data = DataClient::new(transport.clone(), cache_ttl);
        Self {
            roles: RoleResolver::new(config.role_source, data.clone()),
            auth: AuthClient::new(transport.clone()),
            functions: FunctionsClient::new(transport.clone()),
            storage: StorageClient::new(transport),
            data,
        }
    }
}
