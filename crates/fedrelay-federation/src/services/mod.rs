//! Services for the federation subsystem.

pub mod auth_request;
pub mod callback;
pub mod discovery;
pub mod metadata;

pub use auth_request::{AuthenticationRequestBuilder, PkceMethod};
pub use callback::{AuthorizationCodeExtractor, CallbackParams, ValidatedAuthParams};
pub use discovery::{DiscoveredMetadata, DiscoveryService};
pub use metadata::{MetadataCacheSlot, MetadataProvider};
