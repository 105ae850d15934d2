//! Type definitions for fieldscope storage.

mod assignments;
mod hierarchy;
mod ids;
mod principals;
mod roles;

// Re-export all types from submodules
pub use assignments::*;
pub use hierarchy::*;
pub use ids::*;
pub use principals::*;
pub use roles::*;
