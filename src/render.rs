//! Rendered-page fetching through a WebDriver endpoint.
//!
//! Plain HTTP GETs do not survive script-heavy news sites, so every page in
//! the pipeline is loaded by a real browser driven over WebDriver. This
//! module keeps the rest of the code ignorant of that machinery behind one
//! seam: `render(url, identity, wait) -> document`.
//!
//! # Architecture
//!
//! - [`Renderer`]: the trait the discoverer and fetcher depend on
//! - [`WebDriverRenderer`]: production implementation over `fantoccini`;
//!   one fresh browser session per call, identity applied as session
//!   capabilities, session deleted on every exit path
//! - [`RenderError`]: failure classification driving the retry decision
//!
//! A session is never shared between concurrent fetch tasks; each `render`
//! call owns its session for the duration of the call.

use crate::identity::Identity;
use fantoccini::error::{CmdError, NewSessionError};
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

/// Completion condition for one rendered fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitFor {
    /// Navigation completion only; the driver's page-load strategy decides
    /// when the document is ready.
    Load,
    /// Navigation completion plus presence of a CSS selector.
    Css(String),
}

/// Why a rendered fetch failed.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The URL failed syntactic validation before any session was opened.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The WebDriver endpoint refused or failed to create a session.
    #[error("failed to open browser session: {0}")]
    Session(#[from] NewSessionError),
    /// Navigation to the target failed or timed out.
    #[error("navigation failed: {0}")]
    Navigation(CmdError),
    /// The expected content region never appeared.
    #[error("content region `{selector}` never appeared: {source}")]
    Wait {
        selector: String,
        #[source]
        source: CmdError,
    },
    /// The document source could not be read back.
    #[error("could not read page source: {0}")]
    Content(CmdError),
}

impl RenderError {
    /// Whether retrying with a fresh identity can plausibly succeed.
    ///
    /// Network-level failures, page-load failures, and dropped sessions are
    /// transient. A URL that is malformed stays malformed, so those are
    /// permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            RenderError::InvalidUrl(_) => false,
            RenderError::Session(_) => true,
            RenderError::Navigation(e) => !matches!(e, CmdError::BadUrl(_)),
            RenderError::Wait { .. } => true,
            RenderError::Content(_) => true,
        }
    }
}

/// The rendering seam.
///
/// Implementations load `url` as a browser would, presenting `identity`,
/// and return the resulting document once `wait` is satisfied. One call
/// maps to one page/session whose release the implementation guarantees.
pub trait Renderer {
    async fn render(
        &self,
        url: &str,
        identity: &Identity,
        wait: &WaitFor,
    ) -> Result<String, RenderError>;
}

/// Production renderer: one WebDriver session per call.
#[derive(Debug, Clone)]
pub struct WebDriverRenderer {
    webdriver_url: String,
    headless: bool,
    wait_timeout: Duration,
    poll_interval: Duration,
}

impl WebDriverRenderer {
    /// Renderer talking to the WebDriver endpoint at `webdriver_url`.
    pub fn new(webdriver_url: impl Into<String>, headless: bool) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            headless,
            wait_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(500),
        }
    }

    async fn drive(&self, client: &Client, url: &str, wait: &WaitFor) -> Result<String, RenderError> {
        client.goto(url).await.map_err(RenderError::Navigation)?;

        if let WaitFor::Css(selector) = wait {
            client
                .wait()
                .at_most(self.wait_timeout)
                .every(self.poll_interval)
                .for_element(Locator::Css(selector))
                .await
                .map_err(|source| RenderError::Wait {
                    selector: selector.clone(),
                    source,
                })?;
        }

        client.source().await.map_err(RenderError::Content)
    }
}

impl Renderer for WebDriverRenderer {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn render(
        &self,
        url: &str,
        identity: &Identity,
        wait: &WaitFor,
    ) -> Result<String, RenderError> {
        // Catch malformed URLs before paying for a browser session.
        let target = Url::parse(url)?;

        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities_for(identity, self.headless));
        let client = builder.connect(&self.webdriver_url).await?;
        debug!(
            user_agent = %identity.user_agent,
            proxy = ?identity.proxy,
            width = identity.viewport.width,
            height = identity.viewport.height,
            "Opened browser session"
        );

        let outcome = self.drive(&client, target.as_str(), wait).await;

        // The session is deleted whether or not the page ever loaded.
        if let Err(e) = client.close().await {
            warn!(error = %e, "Failed to close browser session");
        }

        outcome
    }
}

/// Session capabilities carrying one identity.
///
/// The user-agent, window size, device scale factor, and `Accept-Language`
/// ride as Chrome launch arguments; the proxy endpoint uses the standard
/// W3C `proxy` capability so non-Chrome drivers honor it too. Headers
/// WebDriver cannot inject (e.g. `Referer`) stay on the [`Identity`] value
/// for backends that can apply them.
pub fn capabilities_for(identity: &Identity, headless: bool) -> Map<String, Value> {
    let mut args = vec![
        format!("--user-agent={}", identity.user_agent),
        format!(
            "--window-size={},{}",
            identity.viewport.width, identity.viewport.height
        ),
        format!("--force-device-scale-factor={}", identity.viewport.scale),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
    ];
    if headless {
        args.push("--headless=new".to_string());
    }
    if let Some(lang) = identity.headers.get("Accept-Language") {
        args.push(format!("--accept-lang={lang}"));
    }

    let mut caps = Map::new();
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
    if let Some(proxy) = &identity.proxy {
        caps.insert(
            "proxy".to_string(),
            json!({
                "proxyType": "manual",
                "httpProxy": proxy,
                "sslProxy": proxy,
            }),
        );
    }
    caps
}

/// Scripted renderer for exercising the pipeline without a browser.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// What one scripted render call should produce.
    #[derive(Debug, Clone)]
    pub(crate) enum FakeOutcome {
        Document(String),
        TransientFailure,
        PermanentFailure,
    }

    #[derive(Debug)]
    struct Script {
        outcomes: Vec<FakeOutcome>,
        cursor: usize,
    }

    impl Script {
        /// Next outcome in sequence; the final one repeats forever.
        fn next(&mut self) -> FakeOutcome {
            let i = self.cursor.min(self.outcomes.len() - 1);
            self.cursor += 1;
            self.outcomes[i].clone()
        }
    }

    /// [`Renderer`] whose responses are scripted per URL.
    ///
    /// Records every served URL and the identity presented with it, so
    /// tests can assert dispatch counts and identity rotation.
    #[derive(Debug, Default)]
    pub(crate) struct FakeRenderer {
        scripts: Mutex<HashMap<String, Script>>,
        served: Mutex<Vec<(String, Identity)>>,
    }

    impl FakeRenderer {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Script the outcomes for `url`, consumed in order; the last
        /// outcome repeats if rendered again.
        pub(crate) fn script(&self, url: &str, outcomes: Vec<FakeOutcome>) {
            assert!(!outcomes.is_empty(), "script needs at least one outcome");
            self.scripts
                .lock()
                .unwrap()
                .insert(url.to_string(), Script { outcomes, cursor: 0 });
        }

        /// How many times `url` was rendered.
        pub(crate) fn serve_count(&self, url: &str) -> usize {
            self.served
                .lock()
                .unwrap()
                .iter()
                .filter(|(u, _)| u == url)
                .count()
        }

        /// All URLs rendered, in call order.
        pub(crate) fn served_urls(&self) -> Vec<String> {
            self.served
                .lock()
                .unwrap()
                .iter()
                .map(|(u, _)| u.clone())
                .collect()
        }

        /// Identities presented for `url`, in call order.
        pub(crate) fn identities_for(&self, url: &str) -> Vec<Identity> {
            self.served
                .lock()
                .unwrap()
                .iter()
                .filter(|(u, _)| u == url)
                .map(|(_, id)| id.clone())
                .collect()
        }

        fn transient_error() -> RenderError {
            RenderError::Wait {
                selector: "article".to_string(),
                source: CmdError::WaitTimeout,
            }
        }

        fn permanent_error() -> RenderError {
            RenderError::InvalidUrl(Url::parse("no scheme").unwrap_err())
        }
    }

    impl Renderer for FakeRenderer {
        async fn render(
            &self,
            url: &str,
            identity: &Identity,
            _wait: &WaitFor,
        ) -> Result<String, RenderError> {
            self.served
                .lock()
                .unwrap()
                .push((url.to_string(), identity.clone()));

            let outcome = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(url)
                .map(|script| script.next());

            match outcome {
                Some(FakeOutcome::Document(body)) => Ok(body),
                Some(FakeOutcome::TransientFailure) => Err(Self::transient_error()),
                Some(FakeOutcome::PermanentFailure) | None => Err(Self::permanent_error()),
            }
        }
    }
}
