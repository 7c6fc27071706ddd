//! Client configuration.
//!
//! Everything has a working default, so `Config::default()` talks to the
//! public service as a logged-out guest. A TOML file can override any
//! subset of the fields:
//!
//! ```toml
//! cookie = "MUSIC_U=...; __csrf=..."
//! comment_page_size = 30
//! eapi_minimal_cookie = false
//! ```
//!
//! Two environment variables take precedence over both:
//!
//! * `NCMAPI_COOKIE` - the initial cookie string
//! * `NCMAPI_EAPI_MINIMAL_COOKIE` - `true`/`false`, `1`/`0`, `on`/`off`

use std::{env, fs, time::Duration};

use serde::Deserialize;
use url::Url;
use veil::Redact;

use crate::error::{Error, Result};

/// Environment variable holding the initial cookie string.
pub const COOKIE_ENV: &str = "NCMAPI_COOKIE";

/// Environment variable toggling the EAPI cookie allow-list.
pub const EAPI_MINIMAL_COOKIE_ENV: &str = "NCMAPI_EAPI_MINIMAL_COOKIE";

/// Configuration files are a handful of lines; anything bigger is a mistake.
const MAX_CONFIG_SIZE: u64 = 64 * 1024;

/// User agent of a desktop browser. Sessions start out with this one, which
/// the transport swaps for the mobile client's.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Clone, PartialEq, Deserialize, Redact)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Host for paths that are neither `/api`, `/weapi` nor `/eapi`.
    pub interface_host: Url,

    /// Host for `/api` and `/weapi` paths.
    pub web_host: Url,

    /// Host for `/eapi` paths.
    pub eapi_host: Url,

    /// User agent stored in the session.
    pub user_agent: String,

    /// Initial cookies as `name=value; name=value`.
    #[redact]
    pub cookie: Option<String>,

    /// Whether EAPI requests only carry the cookies the mobile client sends.
    pub eapi_minimal_cookie: bool,

    /// Top-level comments per page.
    pub comment_page_size: u32,

    /// Replies per floor page.
    pub floor_limit: u32,

    /// Read timeout of a single response.
    #[serde(with = "duration_secs")]
    pub read_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface_host: Url::parse("https://interface.163.com").expect("invalid url"),
            web_host: Url::parse("https://music.163.com").expect("invalid url"),
            eapi_host: Url::parse("https://interface.music.163.com").expect("invalid url"),
            user_agent: BROWSER_USER_AGENT.to_owned(),
            cookie: None,
            eapi_minimal_cookie: true,
            comment_page_size: 20,
            floor_limit: 30,
            read_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Reads a TOML configuration file and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the file cannot be read, is unreasonably
    /// large, does not parse or holds invalid values.
    pub fn from_file(path: &str) -> Result<Self> {
        // Prevent out-of-memory condition: the file should be small.
        let size = fs::metadata(path)?.len();
        if size > MAX_CONFIG_SIZE {
            return Err(Error::invalid_argument(format!(
                "{path} is too large ({size} bytes)"
            )));
        }

        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        debug!("loaded configuration from {path}");

        config.with_env()
    }

    /// Parses a TOML document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on malformed TOML, unknown keys or invalid
    /// values.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `NCMAPI_COOKIE` and `NCMAPI_EAPI_MINIMAL_COOKIE`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the toggle is not a recognizable boolean.
    pub fn with_env(mut self) -> Result<Self> {
        if let Ok(cookie) = env::var(COOKIE_ENV) {
            if !cookie.trim().is_empty() {
                debug!("using cookie from {COOKIE_ENV}");
                self.cookie = Some(cookie);
            }
        }

        if let Ok(value) = env::var(EAPI_MINIMAL_COOKIE_ENV) {
            self.eapi_minimal_cookie = parse_toggle(&value).ok_or_else(|| {
                Error::invalid_argument(format!(
                    "{EAPI_MINIMAL_COOKIE_ENV} should be a boolean but is \"{value}\""
                ))
            })?;
        }

        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        for host in [&self.interface_host, &self.web_host, &self.eapi_host] {
            if host.cannot_be_a_base() || !matches!(host.scheme(), "http" | "https") {
                return Err(Error::invalid_argument(format!(
                    "{host} is not an http(s) host"
                )));
            }
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::invalid_argument("user agent must not be empty"));
        }

        if self.comment_page_size == 0 || self.floor_limit == 0 {
            return Err(Error::invalid_argument("page sizes must be positive"));
        }

        Ok(())
    }
}

/// Base URL of `host` without a trailing slash, ready for path concatenation.
#[must_use]
pub fn origin(host: &Url) -> String {
    host.as_str().trim_end_matches('/').to_owned()
}

fn parse_toggle(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(origin(&config.web_host), "https://music.163.com");
        assert_eq!(origin(&config.eapi_host), "https://interface.music.163.com");
        assert_eq!(origin(&config.interface_host), "https://interface.163.com");
        assert!(config.eapi_minimal_cookie);
        assert_eq!(config.comment_page_size, 20);
        assert_eq!(config.floor_limit, 30);
        assert!(config.user_agent.starts_with("Mozilla/"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            cookie = "MUSIC_U=secret"
            eapi_minimal_cookie = false
            read_timeout = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(config.cookie.as_deref(), Some("MUSIC_U=secret"));
        assert!(!config.eapi_minimal_cookie);
        assert_eq!(config.read_timeout, Duration::from_millis(2500));
        assert_eq!(config.comment_page_size, 20);
    }

    #[test]
    fn rejects_invalid_documents() {
        for doc in [
            "unknown = 1",
            "comment_page_size = 0",
            r#"web_host = "ftp://music.163.com""#,
            r#"user_agent = "  ""#,
            "cookie = ",
        ] {
            let err = Config::from_toml(doc).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidArgument, "{doc}");
        }
    }

    #[test]
    fn cookie_is_redacted() {
        let config = Config {
            cookie: Some("MUSIC_U=very-secret-token".to_owned()),
            ..Config::default()
        };
        assert!(!format!("{config:?}").contains("very-secret-token"));
    }

    #[test]
    fn toggles() {
        assert_eq!(parse_toggle(" ON "), Some(true));
        assert_eq!(parse_toggle("0"), Some(false));
        assert_eq!(parse_toggle("maybe"), None);
    }

    #[test]
    fn missing_file() {
        let err = Config::from_file("/nonexistent/ncmapi.toml").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }
}
