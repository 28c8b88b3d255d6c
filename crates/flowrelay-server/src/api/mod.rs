pub mod chat;
pub mod files;
pub mod session;
pub mod state;

pub use state::AppState;
