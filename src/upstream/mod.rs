pub mod auth;
pub mod client;
pub mod envelope;
pub mod pagination;
pub mod transport;

pub use auth::{AuthOverrides, Service};
pub use client::{DateRange, MatchRoster, UpstreamClient};
pub use envelope::extract_items;
pub use pagination::{PageRequest, PageWalker, PaginationScheme, DEFAULT_SCHEMES};
pub use transport::{HttpGet, ReqwestTransport, UpstreamResponse};
