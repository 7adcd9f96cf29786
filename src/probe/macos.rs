//! [PlatformQueries] implemented with AppleScript through `osascript`.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{instrument, trace};

use super::{BrowserTab, PlatformQueries, ProbeError};

/// Answers the displayed application name (`Firefox`), which can differ from the process
/// name (`firefox`) that browser allowlists would otherwise have to match.
const FOREGROUND_APPLICATION_SCRIPT: &str = r#"
tell application "System Events"
    return displayed name of first application process whose frontmost is true
end tell
"#;

/// Separates url and title in the browser script output.
const TAB_SEPARATOR: char = '|';

#[derive(Default)]
pub struct AppleScriptQueries;

impl AppleScriptQueries {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PlatformQueries for AppleScriptQueries {
    #[instrument(level = "debug", skip(self))]
    async fn foreground_application(&mut self) -> Result<String, ProbeError> {
        run_applescript(FOREGROUND_APPLICATION_SCRIPT).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn browser_tab(&mut self, app: &str) -> Result<BrowserTab, ProbeError> {
        let output = run_applescript(&browser_tab_script(app)).await?;
        parse_browser_tab(&output)
    }

    #[instrument(level = "debug", skip(self))]
    async fn window_title(&mut self, app: &str) -> Result<Option<String>, ProbeError> {
        let output = run_applescript(&window_title_script(app)).await?;
        Ok(Some(output).filter(|title| !title.is_empty() && title != "missing value"))
    }
}

async fn run_applescript(script: &str) -> Result<String, ProbeError> {
    // kill_on_drop reaps osascript when the surrounding timeout abandons this future.
    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::Query(format!("osascript failed: {}", stderr.trim())));
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    trace!("osascript answered {stdout:?}");
    Ok(stdout)
}

fn escape_applescript_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn browser_tab_script(app: &str) -> String {
    // Safari calls the front tab `current tab`, chromium based browsers `active tab`.
    let tab = if app == "Safari" {
        "current tab"
    } else {
        "active tab"
    };
    format!(
        r#"
tell application "{app}"
    set currentTab to {tab} of front window
    return (URL of currentTab) & "{TAB_SEPARATOR}" & (name of currentTab)
end tell
"#,
        app = escape_applescript_string(app),
    )
}

fn window_title_script(app: &str) -> String {
    format!(
        r#"
tell application "System Events"
    tell process "{app}"
        try
            return name of front window
        on error
            return ""
        end try
    end tell
end tell
"#,
        app = escape_applescript_string(app),
    )
}

fn parse_browser_tab(output: &str) -> Result<BrowserTab, ProbeError> {
    let Some((url, title)) = output.split_once(TAB_SEPARATOR) else {
        return Err(ProbeError::Query(format!(
            "unexpected browser answer {output:?}"
        )));
    };
    Ok(BrowserTab {
        url: url.trim().to_string(),
        title: title.trim().to_string(),
    })
}
