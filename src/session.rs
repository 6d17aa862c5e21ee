//! The base URL the rest of the application talks to.
//!
//! A [`Session`] is passed around explicitly instead of living in a global;
//! discovery writes to it and API callers read from it.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

use crate::types::{Resolution, Strategy};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("backend URL is empty")]
    Empty,

    #[error("backend URL must start with http:// or https://: {0}")]
    UnsupportedScheme(String),

    #[error("backend URL has no host: {0}")]
    MissingHost(String),
}

/// A syntactically valid `http(s)://host[:port]` base URL without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackendUrl(String);

impl BackendUrl {
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(UrlError::Empty);
        }
        let lower = trimmed.to_ascii_lowercase();
        let rest = if lower.starts_with("http://") {
            &trimmed["http://".len()..]
        } else if lower.starts_with("https://") {
            &trimmed["https://".len()..]
        } else {
            return Err(UrlError::UnsupportedScheme(trimmed.to_string()));
        };
        let authority = rest.split('/').next().unwrap_or("");
        if authority.is_empty() || authority.starts_with(':') {
            return Err(UrlError::MissingHost(trimmed.to_string()));
        }
        Ok(Self(trimmed.trim_end_matches('/').to_string()))
    }

    /// `http://<ip>:<port>` for a discovered address.
    pub fn from_ip(ip: Ipv4Addr, port: u16) -> Self {
        Self(format!("http://{ip}:{port}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn join(&self, route: Route) -> String {
        format!("{}{}", self.0, route.path())
    }
}

impl fmt::Display for BackendUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BackendUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BackendUrl {
    type Error = UrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BackendUrl> for String {
    fn from(value: BackendUrl) -> Self {
        value.0
    }
}

/// REST routes served by the study-coach backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Health,
    Scan,
    GenerateQuiz,
    Summary,
    GenerateFlashcards,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Health => "/health",
            Route::Scan => "/api/scan",
            Route::GenerateQuiz => "/api/generate_quiz",
            Route::Summary => "/api/summary",
            Route::GenerateFlashcards => "/api/generate_flashcards",
        }
    }
}

/// Where the current base URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlSource {
    Discovered(Strategy),
    Override,
    Cache,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    current: Option<(BackendUrl, UrlSource)>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a discovery result. Replaces whatever was set before.
    pub fn apply(&mut self, resolution: &Resolution, port: u16) -> &BackendUrl {
        let url = BackendUrl::from_ip(resolution.address, port);
        tracing::info!(%url, strategy = %resolution.strategy, "backend URL resolved");
        self.set(url, UrlSource::Discovered(resolution.strategy))
    }

    /// Use a user-supplied URL as-is after a syntax check. No probe is made.
    pub fn set_override(&mut self, raw: &str) -> Result<&BackendUrl, UrlError> {
        let url = BackendUrl::parse(raw)?;
        tracing::info!(%url, "backend URL overridden by user");
        Ok(self.set(url, UrlSource::Override))
    }

    /// Restore a cached URL that has just passed a health check.
    pub fn restore(&mut self, url: BackendUrl) -> &BackendUrl {
        self.set(url, UrlSource::Cache)
    }

    fn set(&mut self, url: BackendUrl, source: UrlSource) -> &BackendUrl {
        &self.current.insert((url, source)).0
    }

    pub fn base_url(&self) -> Option<&BackendUrl> {
        self.current.as_ref().map(|(u, _)| u)
    }

    pub fn source(&self) -> Option<UrlSource> {
        self.current.as_ref().map(|(_, s)| *s)
    }

    /// False only for the optimistic unprobed-hint fallback.
    pub fn is_verified(&self) -> bool {
        match self.source() {
            Some(UrlSource::Discovered(s)) => s.is_verified(),
            Some(UrlSource::Override | UrlSource::Cache) => true,
            None => false,
        }
    }

    pub fn endpoint(&self, route: Route) -> Option<String> {
        self.base_url().map(|u| u.join(route))
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
