use std::{fmt::Display, sync::Arc};

use url::Url;

use crate::storage::entities::Sample;

/// Identity time is aggregated under: the domain of the tab for browsers, the application
/// name otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActivityKey(Arc<str>);

impl ActivityKey {
    pub fn from_sample(sample: &Sample) -> Self {
        sample
            .url
            .as_deref()
            .and_then(domain_of)
            .map(|domain| Self(domain.into()))
            .unwrap_or_else(|| Self(sample.app_name.clone()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActivityKey {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl Display for ActivityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host of `url` without a leading `www.`. Urls without a host (`about:blank`, garbage) have no
/// domain.
fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    Some(host.to_string()).filter(|host| !host.is_empty())
}
