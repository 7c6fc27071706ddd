//! Rate limited HTTP client.
//!
//! Wraps `reqwest::Client` with:
//! * a request rate limit, so a scrolling user interface cannot hammer the
//!   service into blocking the visitor
//! * keep-alive and read timeouts
//!
//! Responses are never decompressed here. The service labels compressed
//! bodies inconsistently, so [`crate::transport`] inspects the raw bytes
//! itself.
//!
//! # Rate Limiting
//!
//! * 50 calls per 5-second interval
//! * bursts up to the maximum calls per interval
//! * requests that would exceed the limit are delayed, not rejected
//!
//! # Example
//!
//! ```rust
//! use ncmapi::{config::Config, http::Client};
//!
//! let client = Client::new(&Config::default())?;
//! let request = client.request(Method::POST, url, headers, body);
//! let response = client.execute(request).await?;
//! ```

use std::{future::Future, num::NonZeroU32, time::Duration};

use futures_util::{FutureExt, TryFutureExt};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{header::HeaderMap, Body, Method, Url};

use crate::{config::Config, error::Result};

pub struct Client {
    /// Underlying client without rate limiting.
    pub unlimited: reqwest::Client,

    rate_limiter: DefaultDirectRateLimiter,
}

impl Client {
    /// Rolling window of the rate limit.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(5);

    /// Calls allowed within each window.
    const RATE_LIMIT_CALLS_PER_INTERVAL: u8 = 50;

    /// Duration to keep idle connections alive.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Duration to wait for a connection to be established.
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialized.
    ///
    /// # Panics
    ///
    /// Panics if rate limit parameters are zero.
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .read_timeout(config.read_timeout);

        let replenish_interval =
            Self::RATE_LIMIT_INTERVAL / u32::from(Self::RATE_LIMIT_CALLS_PER_INTERVAL);
        let quota = Quota::with_period(replenish_interval)
            .expect("quota time interval is zero")
            .allow_burst(
                NonZeroU32::new(Self::RATE_LIMIT_CALLS_PER_INTERVAL.into())
                    .expect("calls per interval is zero"),
            );

        Ok(Self {
            unlimited: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    /// Builds a request with specified method, URL, headers and body.
    #[must_use]
    pub fn request<T>(&self, method: Method, url: Url, headers: HeaderMap, body: Option<T>) -> reqwest::Request
    where
        T: Into<Body>,
    {
        let mut request = reqwest::Request::new(method, url);
        *request.headers_mut() = headers;
        *request.body_mut() = body.map(Into::into);
        request
    }

    /// Executes a request once the rate limiter allows it.
    ///
    /// # Errors
    ///
    /// Returns `Transport` or `Timeout` if the request fails before a
    /// response arrives.
    pub fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response>> + '_ {
        let throttle = self.rate_limiter.until_ready();
        throttle.then(|()| self.unlimited.execute(request).map_err(Into::into))
    }
}
