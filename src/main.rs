// Page pool demo
//
// Launches Chrome, builds a pool of tabs and takes full-page screenshots of
// one URL from ten concurrent tasks, logging pool stats around each checkout.
//
// Usage: page-pool-demo [URL] [OUTPUT_DIR]
// PAGE_POOL_CONFIG may point at a JSON PoolConfig overriding the defaults.

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use page_pool::{
    LaunchOptions, PagePool, PageSource, PoolConfig, launch_browser, with_page_timeout,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

const DEFAULT_URL: &str = "https://example.com/";
const DEFAULT_OUTPUT_DIR: &str = "./storages/images";
const TASKS: usize = 10;
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
                .add_directive("chromiumoxide::handler=off".parse()?)
                .add_directive("chromiumoxide::conn=off".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| DEFAULT_URL.to_string());
    let output_dir = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()));

    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let config = load_config()?;
    let session = launch_browser(LaunchOptions::default()).await?;
    let pool = PagePool::new(PageSource::new(session.browser_arc()), config)
        .await
        .context("Failed to start page pool")?;

    let mut tasks = JoinSet::new();
    for task in 0..TASKS {
        let pool = pool.clone();
        let url = url.clone();
        let output_dir = output_dir.clone();
        tasks.spawn(async move {
            if let Err(e) = screenshot(&pool, &url, &output_dir).await {
                error!("Task {} failed: {:#}", task, e);
            }
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.context("Screenshot task panicked")?;
    }

    info!("Final stats: {:?}", pool.stats());
    pool.close().await;
    drop(pool);
    session.shutdown().await
}

fn load_config() -> Result<PoolConfig> {
    if let Ok(path) = std::env::var("PAGE_POOL_CONFIG") {
        info!("Loading pool config from {}", path);
        return PoolConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load pool config from {path}"));
    }

    PoolConfig::builder()
        .init_active(3)
        .max_idle(5)
        .max_active(6)
        .idle_timeout(Duration::from_secs(60))
        .wait(true)
        .max_conn_lifetime(Duration::from_secs(3600))
        .build()
        .context("Invalid demo pool config")
}

async fn screenshot(pool: &PagePool, url: &str, output_dir: &Path) -> Result<()> {
    let mut page = pool.acquire().await.context("Failed to acquire page")?;
    info!("stats: {:?}", pool.stats());

    let captured = with_page_timeout(
        async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            let params = CaptureScreenshotParams {
                format: Some(CaptureScreenshotFormat::Png),
                capture_beyond_viewport: Some(true),
                ..Default::default()
            };
            Ok(page.screenshot(params).await?)
        },
        NAVIGATION_TIMEOUT,
        "Screenshot",
    )
    .await;

    let bytes = match captured {
        Ok(bytes) => bytes,
        Err(e) => {
            page.mark_broken();
            page.release().await;
            return Err(e);
        }
    };

    let path = output_dir.join(format!("feeds_{}.png", Uuid::new_v4()));
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Saved screenshot of {} to {}", url, path.display());

    page.release().await;
    info!("stats: {:?}", pool.stats());
    Ok(())
}
