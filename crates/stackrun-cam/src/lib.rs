//! HTTP client for the cloud-automation (CAM) REST API
//!
//! [`CamClient`] implements [`stackrun_cloud::CamApi`] over reqwest. It logs
//! in through [`Authenticator`] (hosted or on-prem flow, chosen by the
//! configured target) and keeps the resulting [`Session`] behind a lock so a
//! rejected token can be replaced mid-run.
//!
//! # Example
//!
//! ```ignore
//! use stackrun_cam::CamClient;
//! use stackrun_cloud::CamApi;
//!
//! let client = CamClient::connect(&config).await?;
//! for connection in client.cloud_connections().await? {
//!     println!("{}", connection.name);
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod session;

pub use auth::{Authenticator, find_key};
pub use client::CamClient;
pub use error::Exchange;
pub use session::{BearerToken, Session};
