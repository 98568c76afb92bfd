//! Podforge client library.
//!
//! Client-side data synchronization for the print-on-demand product
//! service:
//!
//! - [`cache`] - Query cache with sequence-numbered resolutions,
//!   prefix invalidation and subscriptions
//! - [`mutation`] - Writes that invalidate the queries they affect
//! - [`polling`] - Interval re-resolution until a value settles
//! - [`connection`] - Per-provider connection state machine
//! - [`gateway`] - The REST operations, over HTTP or scripted in tests
//! - [`client`] - [`PodClient`], one method per REST operation
//! - [`integrations`] - Connect / disconnect / test workflow
//!
//! # Example
//!
//! ```no_run
//! use podforge_client::{ClientConfig, PodClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PodClient::from_config(&ClientConfig::from_env()?)?;
//! for draft in client.load_drafts().await? {
//!     println!("{} {}", draft.id, draft.status);
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod integrations;
pub mod mutation;
pub mod polling;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use cache::{QueryCache, QueryData, QueryKey, QuerySnapshot, QueryStatus, Subscription};
pub use client::{PodClient, QueryValue, keys};
pub use config::{ClientConfig, ConfigError, PollingConfig};
pub use connection::{ConnectionState, ProviderAction, ProviderView};
pub use error::{ClientError, TransportError, ValidationError};
pub use gateway::{AssetUpload, Gateway, HttpGateway};
pub use integrations::{IntegrationsController, MessageKind, StatusMessage};
pub use polling::{PollHandle, PollOptions, PollOutcome};
