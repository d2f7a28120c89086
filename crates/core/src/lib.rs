pub mod event;
pub mod files;
pub mod log;
pub mod merge;
pub mod timeline;

pub use event::*;
pub use timeline::*;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
