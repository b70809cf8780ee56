//! API layer - HTTP endpoints and middleware

pub mod health;
pub mod middleware;
pub mod query;
pub mod router;
pub mod schema;
pub mod state;
pub mod types;

pub use router::{create_api_router, create_router};
pub use state::AppState;
