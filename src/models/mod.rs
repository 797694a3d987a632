mod credentials;
mod protocol;
mod rewrite;

pub use credentials::*;
pub use protocol::*;
pub use rewrite::*;
