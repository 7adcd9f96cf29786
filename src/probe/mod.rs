//! Reads which application, window and browser tab currently has focus.
//!
//! [FocusProbe] is what the tracker depends on. [DesktopProbe] implements it on top of the
//! three raw [PlatformQueries] a backend has to provide, and [TimeoutProbe] bounds how long
//! any probe may take.

pub mod macos;
#[cfg(feature = "x11")]
pub mod x11;

use std::{collections::HashSet, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::{debug, instrument};

/// Shown instead of a window title when the application has no readable front window.
pub const NO_WINDOW_TITLE: &str = "No window title available";

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no application has focus")]
    NoApplication,
    #[error("failed to read the active tab of {app}: {reason}")]
    BrowserTab { app: String, reason: String },
    #[error("platform query failed: {0}")]
    Query(String),
    #[error("failed to run platform query: {0}")]
    Io(#[from] std::io::Error),
    #[error("probe didn't answer within {0:?}")]
    Timeout(Duration),
    #[error("{0} isn't supported on this platform")]
    Unsupported(&'static str),
}

/// Focus state at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusSnapshot {
    pub app_name: Arc<str>,
    /// Window or tab title, [NO_WINDOW_TITLE] when unavailable.
    pub window_title: Arc<str>,
    /// Only present for applications on the browser allowlist.
    pub url: Option<Arc<str>>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait FocusProbe: Send {
    async fn sample(&mut self) -> Result<FocusSnapshot, ProbeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserTab {
    pub url: String,
    pub title: String,
}

/// Raw operating system queries. Every one of them may fail.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlatformQueries: Send {
    /// Name of the application owning the focused window.
    async fn foreground_application(&mut self) -> Result<String, ProbeError>;

    /// Url and title of the active tab in the front window of browser `app`.
    async fn browser_tab(&mut self, app: &str) -> Result<BrowserTab, ProbeError>;

    /// Title of the front window of `app`. `None` when it has no window with a title.
    async fn window_title(&mut self, app: &str) -> Result<Option<String>, ProbeError>;
}

/// [FocusProbe] that additionally reads the active tab for applications on a browser allowlist.
///
/// A browser without a readable tab is an error, while a regular application without a window
/// title is reported with [NO_WINDOW_TITLE].
pub struct DesktopProbe<Q> {
    queries: Q,
    browsers: HashSet<String>,
}

impl<Q: PlatformQueries> DesktopProbe<Q> {
    pub fn new(queries: Q, browsers: impl IntoIterator<Item = String>) -> Self {
        Self {
            queries,
            browsers: browsers.into_iter().collect(),
        }
    }

    async fn browser_snapshot(&mut self, app_name: String) -> Result<FocusSnapshot, ProbeError> {
        let tab = self
            .queries
            .browser_tab(&app_name)
            .await
            .map_err(|e| ProbeError::BrowserTab {
                app: app_name.clone(),
                reason: e.to_string(),
            })?;
        let url = tab.url.trim();
        if url.is_empty() {
            return Err(ProbeError::BrowserTab {
                app: app_name,
                reason: "tab has no url".into(),
            });
        }
        Ok(FocusSnapshot {
            window_title: tab.title.trim().into(),
            url: Some(url.into()),
            app_name: app_name.into(),
        })
    }

    async fn application_snapshot(&mut self, app_name: String) -> FocusSnapshot {
        let title = match self.queries.window_title(&app_name).await {
            Ok(Some(title)) if !title.trim().is_empty() => title.trim().to_string(),
            Ok(_) => NO_WINDOW_TITLE.to_string(),
            Err(e) => {
                debug!("Couldn't read window title of {app_name}: {e}");
                NO_WINDOW_TITLE.to_string()
            }
        };
        FocusSnapshot {
            app_name: app_name.into(),
            window_title: title.into(),
            url: None,
        }
    }
}

#[async_trait]
impl<Q: PlatformQueries> FocusProbe for DesktopProbe<Q> {
    #[instrument(level = "debug", skip(self))]
    async fn sample(&mut self) -> Result<FocusSnapshot, ProbeError> {
        let app_name = self.queries.foreground_application().await?;
        let app_name = app_name.trim().to_string();
        if app_name.is_empty() {
            return Err(ProbeError::NoApplication);
        }

        if self.browsers.contains(&app_name) {
            self.browser_snapshot(app_name).await
        } else {
            Ok(self.application_snapshot(app_name).await)
        }
    }
}

/// Fails a sample with [ProbeError::Timeout] when the wrapped probe hangs. Dropping the
/// pending query is enough to abandon it.
pub struct TimeoutProbe {
    inner: Box<dyn FocusProbe>,
    limit: Duration,
}

impl TimeoutProbe {
    pub fn new(inner: Box<dyn FocusProbe>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl FocusProbe for TimeoutProbe {
    async fn sample(&mut self) -> Result<FocusSnapshot, ProbeError> {
        tokio::time::timeout(self.limit, self.inner.sample())
            .await
            .map_err(|_| ProbeError::Timeout(self.limit))?
    }
}

/// Creates the probe for the platform the binary was built for.
pub fn platform_probe(browsers: Vec<String>, timeout: Duration) -> Result<Box<dyn FocusProbe>> {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "macos")] {
            let probe = DesktopProbe::new(macos::AppleScriptQueries::new(), browsers);
            Ok(Box::new(TimeoutProbe::new(Box::new(probe), timeout)))
        } else if #[cfg(feature = "x11")] {
            let probe = DesktopProbe::new(x11::X11Queries::new()?, browsers);
            Ok(Box::new(TimeoutProbe::new(Box::new(probe), timeout)))
        } else {
            let _ = (browsers, timeout);
            Err(anyhow::anyhow!(
                "No focus probe is available for this platform. On Linux build with the `x11` feature"
            ))
        }
    }
}
