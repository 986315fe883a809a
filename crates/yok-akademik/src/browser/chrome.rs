//! Chromium driver for the registry site.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use super::scripts;
use super::{PageTurn, RawCollaboratorNode, RawProfileRow, RegistrySite};
use crate::config::{site, Config};
use crate::error::{BrowserError, BrowserResult};

/// Resource patterns the driver never loads.
const BLOCKED_RESOURCES: &[&str] = &["*.css", "*.woff", "*.woff2", "*.ttf", "*.otf", "*.eot"];

/// A headless Chromium session on the registry site.
pub struct ChromeSite {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    element_timeout: Duration,
    consent_timeout: Duration,
    poll_interval: Duration,
}

impl ChromeSite {
    /// Launch Chromium with the fixed window size and user agent.
    pub async fn launch(config: &Config) -> BrowserResult<Self> {
        let (width, height) = site::WINDOW_SIZE;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-plugins")
            .arg("--blink-settings=imagesEnabled=false")
            .arg(format!("--user-agent={}", site::USER_AGENT));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(bin) = &config.chrome_bin {
            builder = builder.chrome_executable(bin);
        }
        let browser_config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "Browser handler stopped");
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        page.set_user_agent(site::USER_AGENT).await?;
        page.execute(EnableParams::default()).await?;
        page.execute(SetBlockedUrLsParams::new(
            BLOCKED_RESOURCES.iter().map(|p| (*p).to_string()).collect(),
        ))
        .await?;

        tracing::debug!(headless = config.headless, "Browser launched");

        Ok(Self {
            browser,
            page,
            handler,
            element_timeout: config.element_timeout,
            consent_timeout: config.consent_timeout,
            poll_interval: config.poll_interval,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> BrowserResult<T> {
        let result = self.page.evaluate_expression(script).await?;
        Ok(result.into_value::<T>()?)
    }

    /// Poll a boolean script until it holds or `within` expires.
    ///
    /// Evaluation errors count as "not yet": they happen while a navigation
    /// replaces the execution context.
    async fn poll_until(&self, script: &str, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        loop {
            if matches!(self.eval::<bool>(script).await, Ok(true)) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn wait_for(&self, what: &str, script: &str) -> BrowserResult<()> {
        if self.poll_until(script, self.element_timeout).await {
            Ok(())
        } else {
            Err(BrowserError::timeout(what, self.element_timeout))
        }
    }

    async fn wait_for_selector(&self, selector: &str) -> BrowserResult<()> {
        self.wait_for(selector, &scripts::exists(selector)).await
    }

    /// Wait for `selector` and click it from page script.
    async fn click_when_present(&self, selector: &str) -> BrowserResult<()> {
        self.wait_for_selector(selector).await?;
        if self.eval::<bool>(&scripts::click(selector)).await? {
            Ok(())
        } else {
            Err(BrowserError::not_found(selector))
        }
    }
}

#[async_trait]
impl RegistrySite for ChromeSite {
    async fn open_search(&mut self) -> BrowserResult<()> {
        tracing::debug!(url = site::SEARCH_URL, "Opening search page");
        self.page.goto(site::SEARCH_URL).await?;
        self.wait_for_selector(scripts::SEARCH_FIELD).await
    }

    async fn dismiss_consent(&mut self) -> bool {
        let script = scripts::click_by_text("button", scripts::CONSENT_BUTTON, false);
        let dismissed = self.poll_until(&script, self.consent_timeout).await;
        tracing::debug!(dismissed, "Cookie consent");
        dismissed
    }

    async fn submit_search(&mut self, name: &str) -> BrowserResult<()> {
        let field = self.page.find_element(scripts::SEARCH_FIELD).await?;
        field.click().await?.type_str(name).await?;
        self.click_when_present(scripts::SEARCH_BUTTON).await
    }

    async fn open_academics_tab(&mut self) -> BrowserResult<()> {
        let script = scripts::click_by_text("a", scripts::ACADEMICS_TAB, true);
        if self.poll_until(&script, self.element_timeout).await {
            Ok(())
        } else {
            Err(BrowserError::not_found(scripts::ACADEMICS_TAB))
        }
    }

    async fn result_rows(&mut self) -> BrowserResult<Option<Vec<RawProfileRow>>> {
        if !self.poll_until(&scripts::exists(scripts::RESULT_ROW), self.element_timeout).await {
            return Ok(None);
        }
        let rows: Vec<RawProfileRow> = self.eval(scripts::RESULT_ROWS).await?;
        Ok(Some(rows))
    }

    async fn next_page(&mut self) -> BrowserResult<PageTurn> {
        let outcome: String = match self.eval(scripts::TURN_PAGE).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!(error = %e, "Pagination not clickable");
                return Ok(PageTurn::Unavailable);
            }
        };
        match outcome.as_str() {
            "last" => Ok(PageTurn::LastPage),
            "clicked" => {
                if self.poll_until(scripts::PAGE_IS_STALE, self.element_timeout).await {
                    Ok(PageTurn::Advanced)
                } else {
                    Ok(PageTurn::Unavailable)
                }
            }
            _ => Ok(PageTurn::Unavailable),
        }
    }

    async fn open_profile(&mut self, url: &str) -> BrowserResult<()> {
        tracing::debug!(url, "Opening profile");
        self.page.goto(url).await?;
        Ok(())
    }

    async fn open_first_result(&mut self) -> BrowserResult<()> {
        let selector = format!("{} a", scripts::RESULT_ROW);
        self.click_when_present(&selector).await
    }

    async fn open_collaboration_graph(&mut self) -> BrowserResult<()> {
        self.click_when_present(scripts::GRAPH_TAB).await?;
        let deadline = Instant::now() + self.element_timeout;
        loop {
            let groups = self.eval::<usize>(scripts::GRAPH_GROUP_COUNT).await.unwrap_or(0);
            if groups > 2 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::timeout("collaboration graph", self.element_timeout));
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn collaborator_nodes(&mut self) -> BrowserResult<Vec<RawCollaboratorNode>> {
        self.eval(scripts::COLLABORATOR_NODES).await
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!(error = %e, "Browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "Browser process wait failed");
        }
        self.handler.abort();
    }
}
