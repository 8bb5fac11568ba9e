pub mod cache;
pub mod cancel;
pub mod repo;
pub mod result;
pub mod state;
pub mod stats;

// Re-exports for convenience
pub use cache::*;
pub use cancel::*;
pub use repo::*;
pub use result::*;
pub use state::*;
pub use stats::*;
