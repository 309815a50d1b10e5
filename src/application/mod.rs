// Application layer - use cases and orchestration over the repository.
// Every operation takes the caller's owner id explicitly.

pub mod error;
pub mod reporting;
mod service;

pub use error::*;
pub use reporting::*;
pub use service::*;
