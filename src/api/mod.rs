//! The API layer, containing the health handler and routing.

pub mod handlers;
pub mod router;

pub use handlers::ApiDoc;
pub use router::create_router;
