//! Google Calendar collaborators.
//!
//! - [`GoogleCalendarClient`]: reads an account's primary calendar
//! - [`OAuthClient`]: web authorization-code flow and token refresh
//! - [`FileCredentialStore`]: calendar id to token mapping on disk
//!
//! # Authorization
//!
//! 1. The user opens `/auth`; the server calls [`OAuthClient::begin`] and redirects
//! 2. Google calls `/auth` back with `code` and `state`
//! 3. The code is exchanged, [`GoogleCalendarClient::primary_calendar_id`]
//!    names the calendar, and the token is upserted into the store

mod client;
mod config;
mod oauth;
mod store;

pub use client::GoogleCalendarClient;
pub use config::{GoogleConfig, OAuthCredentials};
pub use oauth::{AuthorizationRequest, OAuthClient, PkceFlow};
pub use store::FileCredentialStore;
