//! # dirgate core
//!
//! Backend-agnostic foundation of the dirgate directory gateway.
//!
//! The gateway exposes one contract ([`service::DirectoryService`]) over
//! three directory backends: Microsoft Entra ID via the Graph API,
//! OpenLDAP-compatible directories, and Apple Open Directory. This crate
//! holds everything the backends share:
//!
//! - [`criteria`] / [`query`] - structured search criteria and the
//!   compiler that turns them into a dialect-independent predicate
//!   structure. Backend crates render that structure into OData `$filter`
//!   or RFC 4515 text.
//! - [`page`] - the pagination normalizer: a cursor loop that accumulates
//!   native backend batches (continuation links or one full scan) and
//!   slices the requested window in memory.
//! - [`entity`] - the common user/group/computer result shapes.
//! - [`error`] - the shared error taxonomy.
//! - [`config`] - connection and TLS settings.
//! - [`metrics`] - the per-service operation recorder.
//!
//! ## Example
//!
//! ```ignore
//! use dirgate_core::prelude::*;
//!
//! let criteria = UserCriteria::new()
//!     .with_username("jdoe")
//!     .with_department("Engineering*");
//!
//! let page = service
//!     .users_page(&criteria, &PageRequest::new(1, 50), &cancel)
//!     .await?;
//! println!("{} of {} users", page.items.len(), page.total_count);
//! ```

pub mod config;
pub mod criteria;
pub mod entity;
pub mod error;
pub mod metrics;
pub mod page;
pub mod query;
pub mod service;

/// Prelude module for convenient imports.
///
/// ```
/// use dirgate_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConnectionSettings, TlsConfig};
    pub use crate::criteria::{ComputerCriteria, GroupCriteria, UserCriteria};
    pub use crate::entity::{DirectoryComputer, DirectoryGroup, DirectoryUser};
    pub use crate::error::{DirectoryError, DirectoryResult};
    pub use crate::metrics::{DirectoryMetrics, MetricsSnapshot};
    pub use crate::page::{collect_page, Batch, BatchSource, Page, PageRequest};
    pub use crate::query::{
        ComputerAttributeProfile, GroupAttributeProfile, Leaf, LeafValue, MatchKind, Query, Term,
        UserAttributeProfile,
    };
    pub use crate::service::{
        AuthRequest, AuthenticationOutcome, DirectoryBackend, DirectoryService, OperationStatus,
    };
}

// Re-export async_trait for service implementors
pub use async_trait::async_trait;
