//! Alpine Guardian Core - Shared domain types and storefront logic.
//!
//! This crate provides the types and pure logic used across all Alpine Guardian
//! components:
//! - `backend` - Client for the hosted backend (REST, auth, functions, storage)
//! - `storefront` - Public-facing store
//! - `admin` - Back-office panels
//! - `cli` - Migrations and health checks
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no session handling. Everything here can be unit tested without a
//! runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails, roles and statuses
//! - [`models`] - Records stored in the hosted tables
//! - [`cart`] - Session-held shopping cart
//! - [`catalog`] - Product search, price filter, sorting and review ratings
//! - [`checkout`] - Payment line-item construction

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod models;
pub mod types;

pub use types::*;
