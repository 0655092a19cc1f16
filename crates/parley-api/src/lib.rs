//! Parley API crate - axum HTTP server and route handlers.
//!
//! Exposes the chat turn, session, thread and transcript operations as a JSON
//! API, plus a single embedded chat page at `/ui`.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod ui;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
