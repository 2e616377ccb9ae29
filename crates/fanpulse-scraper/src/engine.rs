//! Headless Chrome scrape engine.
//!
//! One browser process is shared across scrapes and launched lazily on first
//! use. Every scrape opens its own tab inside `spawn_blocking` (the CDP
//! client is synchronous), blocks heavyweight resource types before
//! navigation, and closes the tab on every exit path. A politeness delay is
//! awaited after each scrape so back-to-back page loads do not hammer the
//! source site.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision};
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::{events::RequestPausedEvent, FailRequest};
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::{Browser, LaunchOptions, Tab};
use tokio::sync::Mutex;
use tracing::{info, warn};

use fanpulse_core::{defaults, Error, Fixture, FixtureSource, Result, StandingRow};

use crate::parse;

// Keep the shared browser alive between hourly syncs; the crate default
// idle watchdog would reap it after 30 seconds.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(365 * 86_400);

/// Scraper configuration.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Fixtures page URL.
    pub fixtures_url: String,
    /// Standings page URL.
    pub standings_url: String,
    /// Navigation and selector-wait timeout.
    pub nav_timeout: Duration,
    /// Delay awaited after every scrape.
    pub politeness_delay: Duration,
}

impl ScraperConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SCRAPE_FIXTURES_URL` | — (required) | Fixtures page |
    /// | `SCRAPE_STANDINGS_URL` | — (required) | Standings page |
    /// | `SCRAPE_TIMEOUT_SECS` | `30` | Navigation timeout |
    /// | `SCRAPE_DELAY_MS` | `2000` | Politeness delay |
    pub fn from_env() -> Result<Self> {
        let fixtures_url = std::env::var("SCRAPE_FIXTURES_URL")
            .map_err(|_| Error::Config("SCRAPE_FIXTURES_URL is not set".into()))?;
        let standings_url = std::env::var("SCRAPE_STANDINGS_URL")
            .map_err(|_| Error::Config("SCRAPE_STANDINGS_URL is not set".into()))?;
        let timeout_secs = std::env::var("SCRAPE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::SCRAPE_TIMEOUT_SECS);
        let delay_ms = std::env::var("SCRAPE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::SCRAPE_DELAY_MS);

        Ok(Self {
            fixtures_url,
            standings_url,
            nav_timeout: Duration::from_secs(timeout_secs),
            politeness_delay: Duration::from_millis(delay_ms),
        })
    }
}

/// Shared headless-browser scrape engine implementing [`FixtureSource`].
pub struct ScraperEngine {
    config: ScraperConfig,
    browser: Mutex<Option<Browser>>,
}

impl ScraperEngine {
    /// Create an engine; the browser is not launched until the first scrape.
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            browser: Mutex::new(None),
        }
    }

    /// Lazily launch (or reuse) the shared browser.
    async fn browser(&self) -> Result<Browser> {
        let mut guard = self.browser.lock().await;
        if let Some(browser) = guard.as_ref() {
            return Ok(browser.clone());
        }

        let browser = tokio::task::spawn_blocking(launch_browser)
            .await
            .map_err(|e| Error::Scrape(format!("Browser launch task panicked: {e}")))??;
        info!(
            subsystem = "scraper",
            component = "engine",
            "Headless browser launched"
        );
        *guard = Some(browser.clone());
        Ok(browser)
    }

    /// Render `url` and return its DOM, waiting for `primary` or `fallback`
    /// to appear.
    async fn fetch_page(&self, url: &str, primary: &str, fallback: &str) -> Result<String> {
        let browser = self.browser().await?;
        let url = url.to_string();
        let primary = primary.to_string();
        let fallback = fallback.to_string();
        let timeout = self.config.nav_timeout;

        let html = tokio::task::spawn_blocking(move || {
            scrape_page(&browser, &url, &primary, &fallback, timeout)
        })
        .await
        .map_err(|e| Error::Scrape(format!("Scrape task panicked: {e}")))?;

        tokio::time::sleep(self.config.politeness_delay).await;
        html
    }
}

#[async_trait]
impl FixtureSource for ScraperEngine {
    async fn ensure_ready(&self) -> Result<()> {
        self.browser().await.map(|_| ())
    }

    async fn fetch_fixtures(&self) -> Result<Vec<Fixture>> {
        let html = self
            .fetch_page(
                &self.config.fixtures_url,
                parse::FIXTURE_ROWS[0],
                parse::FIXTURE_ROWS[1],
            )
            .await?;
        let fixtures = parse::parse_fixtures(&html);
        if fixtures.is_empty() {
            warn!(
                subsystem = "scraper",
                component = "engine",
                op = "fetch_fixtures",
                url = %self.config.fixtures_url,
                "No fixtures parsed; page markup may have drifted"
            );
        } else {
            info!(
                subsystem = "scraper",
                component = "engine",
                op = "fetch_fixtures",
                result_count = fixtures.len(),
                "Fixtures scraped"
            );
        }
        Ok(fixtures)
    }

    async fn fetch_standings(&self) -> Result<Vec<StandingRow>> {
        let html = self
            .fetch_page(
                &self.config.standings_url,
                parse::STANDINGS_ROWS[0],
                parse::STANDINGS_ROWS[1],
            )
            .await?;
        let rows = parse::parse_standings(&html);
        if rows.is_empty() {
            warn!(
                subsystem = "scraper",
                component = "engine",
                op = "fetch_standings",
                url = %self.config.standings_url,
                "No standings parsed; page markup may have drifted"
            );
        } else {
            info!(
                subsystem = "scraper",
                component = "engine",
                op = "fetch_standings",
                result_count = rows.len(),
                "Standings scraped"
            );
        }
        Ok(rows)
    }

    async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if guard.take().is_some() {
            info!(
                subsystem = "scraper",
                component = "engine",
                "Headless browser released"
            );
        }
    }
}

fn launch_browser() -> Result<Browser> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .build()
        .map_err(|e| Error::Scrape(format!("Invalid browser launch options: {e}")))?;

    Browser::new(options).map_err(|e| Error::Scrape(format!("Failed to launch browser: {e:#}")))
}

fn scrape_page(
    browser: &Browser,
    url: &str,
    primary: &str,
    fallback: &str,
    timeout: Duration,
) -> Result<String> {
    let tab = browser
        .new_tab()
        .map_err(|e| Error::Scrape(format!("Failed to open tab: {e:#}")))?;

    let result = render_page(&tab, url, primary, fallback, timeout);

    // Tab must not leak even when navigation or the selector wait failed.
    if let Err(e) = tab.close(true) {
        warn!(
            subsystem = "scraper",
            component = "engine",
            error = %e,
            "Failed to close scrape tab"
        );
    }

    result
}

fn render_page(
    tab: &Arc<Tab>,
    url: &str,
    primary: &str,
    fallback: &str,
    timeout: Duration,
) -> Result<String> {
    tab.set_default_timeout(timeout);

    tab.enable_fetch(None, None)
        .map_err(|e| Error::Scrape(format!("Failed to enable fetch domain: {e:#}")))?;
    let interceptor: Arc<dyn RequestInterceptor + Send + Sync> = Arc::new(block_heavy_resources);
    tab.enable_request_interception(interceptor)
        .map_err(|e| Error::Scrape(format!("Failed to enable request interception: {e:#}")))?;

    tab.navigate_to(url)
        .map_err(|e| Error::Scrape(format!("Navigation to {url} failed: {e:#}")))?;

    if tab.wait_for_element(primary).is_err() {
        tab.wait_for_element(fallback).map_err(|e| {
            Error::Scrape(format!(
                "Neither '{primary}' nor '{fallback}' appeared on {url}: {e:#}"
            ))
        })?;
    }

    tab.get_content()
        .map_err(|e| Error::Scrape(format!("Failed to read DOM from {url}: {e:#}")))
}

// Pages render without images, styles, fonts or media; only the markup is
// needed, and skipping the heavy assets cuts load time and bandwidth.
fn block_heavy_resources(
    _transport: Arc<Transport>,
    _session_id: SessionId,
    event: RequestPausedEvent,
) -> RequestPausedDecision {
    match event.params.resource_Type {
        ResourceType::Image
        | ResourceType::Stylesheet
        | ResourceType::Font
        | ResourceType::Media => RequestPausedDecision::Fail(FailRequest {
            request_id: event.params.request_id,
            error_reason: ErrorReason::BlockedByClient,
        }),
        _ => RequestPausedDecision::Continue(None),
    }
}
