pub mod browser_setup;
pub mod clock;
pub mod config;
pub mod error;
pub mod page_source;
pub mod pool;
pub mod resource;

pub use browser_setup::{
    BrowserSession, LaunchOptions, download_managed_browser, find_browser_executable,
    launch_browser,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{ConfigError, PoolError, PoolResult};
pub use page_source::{PageError, PageHandle, PageSource, with_page_timeout};
pub use pool::{Pool, PoolGuard, PoolStats, WaitContext};
pub use resource::{Resource, ResourceSource, SourceError};

/// Pool of chromiumoxide browser tabs
pub type PagePool = Pool<PageSource>;

/// A browser tab checked out of a [`PagePool`]
pub type PageGuard = PoolGuard<PageSource>;

/// Re-exported so callers can build a [`WaitContext`] without naming tokio-util
pub use tokio_util::sync::CancellationToken;
