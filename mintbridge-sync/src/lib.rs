//! Sync engine for mintbridge.
//!
//! Moves orders and catalog items from DSCO into Mintsoft:
//! - [`auth`]: credential providers with cached, single-flight refresh
//! - [`pagination`]: lazy traversal of cursor or numbered listings
//! - [`reconciler`]: create-or-update by natural key
//! - [`orchestrator`]: a full run over a time window, with per-record
//!   failure isolation
//!
//! The remote APIs sit behind the [`SourceFeed`] and [`Destination`] traits,
//! so everything above them can be driven by test doubles.

pub mod auth;
pub mod config;
pub mod destination;
pub mod error;
pub mod http;
pub mod lookup;
pub mod mapping;
pub mod orchestrator;
pub mod pagination;
pub mod reconciler;
pub mod source;

pub use auth::{
    AuthScheme, Credential, CredentialProvider, OAuthClientCredentials, SessionKeyAuth,
    StaticCredential,
};
pub use config::{DestinationConfig, MappingConfig, SourceAuthMode, SourceConfig, SyncConfig};
pub use destination::{Destination, DestinationEntry, ListingPage, MintsoftDestination};
pub use error::{SyncError, SyncResult};
pub use http::ApiClient;
pub use lookup::{IndexedLookup, KeyLookup, ScanLookup};
pub use mapping::{DestinationPayload, OrderMapper, ProductMapper, RecordMapper};
pub use orchestrator::{RunPhase, RunReport, SyncOrchestrator, default_window};
pub use pagination::{PaginatedFetcher, RecordPager};
pub use reconciler::Reconciler;
pub use source::{
    DateField, DscoItemFeed, DscoOrderFeed, ListFilters, Page, PageToken, PaginationStyle,
    SourceFeed,
};
