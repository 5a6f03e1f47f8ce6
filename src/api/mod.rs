//! Aruba Cloud REST API interaction
//!
//! # Module Structure
//!
//! - [`auth`] - Bearer tokens from OAuth2 client credentials or a static token
//! - [`client`] - Client bundle shared by every adapter
//! - [`envelope`] - Uniform wrapper around every REST reply
//! - [`error`] - Error taxonomy and the provider error type
//! - [`http`] - HTTP utilities for REST API calls
//! - [`object`] - `{metadata, properties, status}` wire shape
//!
//! # Example
//!
//! ```ignore
//! use crate::api::client::Client;
//!
//! async fn example(client: &Client, scope: &Scope) -> Result<(), ProviderError> {
//!     let resp: Response<Value> = client.get(scope, "/projects/P1").await?;
//!     let project = resp.into_data(scope.phase())?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod envelope;
pub mod error;
pub mod http;
pub mod object;
