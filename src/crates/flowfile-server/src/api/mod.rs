pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;
pub mod stream;

pub use state::AppState;
