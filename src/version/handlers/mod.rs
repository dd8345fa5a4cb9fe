//! Handler implementations, one per upstream source type

pub mod freecode;
pub mod github;
pub mod pypi;

pub use freecode::FreecodeHandler;
pub use github::GitHubHandler;
pub use pypi::PypiHandler;
