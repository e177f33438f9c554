//! chromiumoxide-backed pooled resource: one browser tab per handle

use chromiumoxide::browser::Browser;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::resource::{Resource, ResourceSource};

/// URL new tabs open on unless configured otherwise
pub const DEFAULT_START_URL: &str = "about:blank";

/// Upper bound for the borrow-time liveness probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum PageError {
    #[error("CDP error: {0}")]
    Cdp(#[from] CdpError),

    #[error("page probe timeout after {0:?}")]
    ProbeTimeout(Duration),
}

/// Wrap a page operation with a timeout
///
/// Distinguishes the timeout from the operation's own failure in the error
/// message.
pub async fn with_page_timeout<F, T>(
    operation: F,
    timeout: Duration,
    operation_name: &str,
) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "{operation_name} timeout after {} ms",
            timeout.as_millis()
        )),
    }
}

/// Opens tabs in a shared browser
#[derive(Debug, Clone)]
pub struct PageSource {
    browser: Arc<Browser>,
    start_url: String,
    probe_timeout: Duration,
}

impl PageSource {
    pub fn new(browser: Arc<Browser>) -> Self {
        Self {
            browser,
            start_url: DEFAULT_START_URL.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// URL each new tab is opened on
    #[must_use]
    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_url = url.into();
        self
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }
}

impl ResourceSource for PageSource {
    type Resource = PageHandle;

    async fn create(&self) -> Result<PageHandle, PageError> {
        let page = self.browser.new_page(self.start_url.as_str()).await?;
        debug!("Opened new tab on {}", self.start_url);
        Ok(PageHandle::new(page, self.probe_timeout))
    }
}

/// A pooled browser tab
///
/// Dereferences to the chromiumoxide [`Page`]. Call
/// [`PageHandle::mark_broken`] after an operation leaves the tab in an
/// unknown state so the pool closes it instead of reusing it.
#[derive(Debug)]
pub struct PageHandle {
    page: Page,
    probe_timeout: Duration,
    broken: AtomicBool,
}

impl PageHandle {
    fn new(page: Page, probe_timeout: Duration) -> Self {
        Self {
            page,
            probe_timeout,
            broken: AtomicBool::new(false),
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn mark_broken(&self) {
        self.broken.store(true, Ordering::Release);
    }
}

impl std::ops::Deref for PageHandle {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.page
    }
}

impl Resource for PageHandle {
    type Error = PageError;

    async fn health_probe(&self) -> Result<(), PageError> {
        let result = tokio::time::timeout(
            self.probe_timeout,
            self.page.evaluate("document.readyState"),
        )
        .await
        .map_err(|_| PageError::ProbeTimeout(self.probe_timeout))??;

        trace!("Page probe readyState: {:?}", result.value());
        Ok(())
    }

    async fn close(self) {
        if let Err(e) = self.page.close().await {
            warn!("Failed to close page: {}", e);
        }
    }

    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }
}
