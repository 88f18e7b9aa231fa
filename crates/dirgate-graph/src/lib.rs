//! # dirgate Graph backend
//!
//! Microsoft Entra ID backend for the dirgate directory gateway, speaking
//! the Microsoft Graph REST API.
//!
//! Structured criteria compile to OData `$filter` expressions; pagination
//! follows `@odata.nextLink` continuations at the Graph batch cap and the
//! shared cursor slices the caller's window in memory. Token acquisition
//! supports the client-credentials flow and Azure managed identity,
//! selected once at construction.
//!
//! # Example
//!
//! ```no_run
//! use dirgate_core::prelude::*;
//! use dirgate_graph::{GraphAuth, GraphConfig, GraphDirectory};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> DirectoryResult<()> {
//! let service = GraphDirectory::new(
//!     GraphConfig::new("contoso.onmicrosoft.com"),
//!     GraphAuth::client_secret("client-id", "client-secret"),
//! )?;
//!
//! let cancel = CancellationToken::new();
//! let page = service
//!     .users_page(
//!         &UserCriteria::new().with_department("Engineering"),
//!         &PageRequest::new(1, 50),
//!         &cancel,
//!     )
//!     .await?;
//! println!("{} of {} users", page.items.len(), page.total_count);
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod config;
pub mod mapper;
pub mod odata;
mod service;

// Re-exports
pub use auth::TokenCache;
pub use client::{GraphApiError, GraphClient, ODataPage};
pub use config::{CloudEnvironment, GraphAuth, GraphConfig, GRAPH_MAX_PAGE_SIZE};
pub use service::GraphDirectory;
