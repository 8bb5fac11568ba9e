pub mod render;
pub mod vcs;

// Re-exports
pub use render::*;
pub use vcs::*;
