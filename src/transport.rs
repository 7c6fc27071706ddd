//! Turns a [`Request`] into an HTTP exchange the service accepts.
//!
//! For every call the transport:
//!
//! 1. assembles cookies from the [`Session`]
//! 2. rewrites `/api/...` to the signing convention's prefix and picks the
//!    host that serves it
//! 3. sets the headers the impersonated client sends
//! 4. signs the parameters (POST) or appends them unsigned (GET)
//! 5. performs the request through the rate limited [`http::Client`]
//! 6. decodes the body, which may be gzip compressed whether or not the
//!    response says so
//!
//! Steps 1 to 4 are pure and exposed as [`prepare`], which is what the
//! tests exercise.
//!
//! # Path and host table
//!
//! | Logical path | Weapi          | Linux          | Eapi          |
//! |--------------|----------------|----------------|---------------|
//! | `/api/x`     | `/weapi/x`     | `/api/x`       | `/eapi/x`     |
//! | `/other`     | `/other`       | `/other`       | `/other`      |
//!
//! `/eapi` paths (and every EAPI request) go to the EAPI host, `/weapi` and
//! `/api` paths to the web host, anything else to the interface host.
//! Absolute URLs are used as given.

use std::{io::Read, sync::Arc};

use flate2::read::GzDecoder;
use reqwest::{
    header::{
        HeaderMap, HeaderValue, ACCEPT, ACCEPT_CHARSET, ACCEPT_ENCODING, CONTENT_ENCODING,
        CONTENT_TYPE, COOKIE, REFERER, SET_COOKIE, USER_AGENT,
    },
    Url,
};
use serde::Deserialize;

use crate::{
    config::{self, Config},
    crypto::{self, CryptoMode, SignedBody},
    error::{Error, Result},
    http,
    protocol::{self, Method, ParamValue, Request},
    session::{self, Cookies, Session},
    util,
};

/// User agent of the Android client. Browser user agents are replaced by
/// this one: the service treats browsers as second-class visitors.
pub const MOBILE_USER_AGENT: &str = "NeteaseMusic/3.7.01.250103035128(3007001);Dalvik/2.1.0 \
    (Linux; U; Android 11; Redmi 6A Build/RQ3A.211001.001)";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const EAPI_FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// The three hosts requests are routed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hosts {
    pub interface: Url,
    pub web: Url,
    pub eapi: Url,
}

impl From<&Config> for Hosts {
    fn from(config: &Config) -> Self {
        Self {
            interface: config.interface_host.clone(),
            web: config.web_host.clone(),
            eapi: config.eapi_host.clone(),
        }
    }
}

impl Default for Hosts {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl Hosts {
    /// Host serving `path`, a path already rewritten by [`transport_path`].
    #[must_use]
    pub fn select(&self, path: &str, mode: CryptoMode) -> &Url {
        if mode == CryptoMode::Eapi || path.starts_with("/eapi") {
            &self.eapi
        } else if path.starts_with("/weapi") || path.starts_with("/api") {
            &self.web
        } else {
            &self.interface
        }
    }

    /// `Referer` for a request to `url`: the origin of the matching host.
    fn referer(&self, url: &Url) -> String {
        [&self.web, &self.eapi]
            .into_iter()
            .find(|host| host.origin() == url.origin())
            .map_or_else(|| config::origin(&self.interface), config::origin)
    }
}

/// Rewrites a logical `/api/...` path to the prefix of the signing
/// convention. Other paths are returned unchanged.
#[must_use]
pub fn transport_path(path: &str, mode: CryptoMode) -> String {
    match (mode, path.strip_prefix("/api/")) {
        (CryptoMode::Weapi, Some(rest)) => format!("/weapi/{rest}"),
        (CryptoMode::Eapi, Some(rest)) => format!("/eapi/{rest}"),
        _ => path.to_owned(),
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("https://") || path.starts_with("http://")
}

/// An HTTP request ready to be sent.
#[derive(Clone, Debug)]
pub struct Prepared {
    pub method: reqwest::Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// Form encoded body of POST requests.
    pub body: Option<String>,
}

/// Builds the HTTP request for `request` without sending it.
///
/// # Errors
///
/// Returns `InvalidArgument` if the path does not form a valid URL or a
/// cookie or user agent cannot be sent as a header, and `Crypto` if signing
/// fails.
pub fn prepare(hosts: &Hosts, session: &Session, request: &Request) -> Result<Prepared> {
    let mode = request.mode;
    let cookies = session.cookies_for(mode, &request.cookies);

    let mut url = if is_absolute(&request.path) {
        Url::parse(&request.path)?
    } else {
        let path = transport_path(&request.path, mode);
        let host = hosts.select(&path, mode);
        Url::parse(&format!("{}{path}", config::origin(host)))?
    };

    let mut headers = HeaderMap::new();
    let user_agent = match session.user_agent() {
        ua if ua.starts_with("Mozilla/") || ua.trim().is_empty() => MOBILE_USER_AGENT,
        ua => ua,
    };
    headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);

    if mode == CryptoMode::Eapi {
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_CHARSET, HeaderValue::from_static("UTF-8"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
    } else {
        headers.insert(REFERER, HeaderValue::from_str(&hosts.referer(&url))?);
    }

    if !cookies.is_empty() {
        headers.insert(COOKIE, HeaderValue::from_str(&session::cookie_header(&cookies))?);
    }

    let body = match request.method {
        Method::Get => {
            if !request.params.is_empty() {
                let mut query = url.query_pairs_mut();
                for (key, value) in request.params.iter() {
                    query.append_pair(key, &value.to_string());
                }
            }
            None
        }
        Method::Post => {
            let content_type = match mode {
                CryptoMode::Eapi => EAPI_FORM_CONTENT_TYPE,
                CryptoMode::Weapi | CryptoMode::Linux => FORM_CONTENT_TYPE,
            };
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));

            let signed = sign(request, &cookies)?;
            Some(
                url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(signed.iter())
                    .finish(),
            )
        }
    };

    debug!("{} {mode} {url}", request.method);
    if log_enabled!(log::Level::Trace) {
        let names: Vec<&str> = cookies.keys().map(String::as_str).collect();
        trace!("cookies: [{}]", names.join(", "));
        let params: Vec<String> = request
            .params
            .iter()
            .map(|(key, value)| format!("{key}={}", util::mask_if_sensitive(key, &value.to_string())))
            .collect();
        trace!("params: {}", params.join(" | "));
    }

    Ok(Prepared {
        method: request.method.into(),
        url,
        headers,
        body,
    })
}

/// JSON that gets signed: the parameters, plus the CSRF token for WEAPI.
#[must_use]
pub fn signing_payload(request: &Request, cookies: &Cookies) -> String {
    if request.mode == CryptoMode::Weapi {
        let mut params = request.params.clone();
        params.insert("csrf_token", session::csrf_token(cookies));
        params.to_json()
    } else {
        request.params.to_json()
    }
}

fn sign(request: &Request, cookies: &Cookies) -> Result<SignedBody> {
    let payload = signing_payload(request, cookies);
    match request.mode {
        CryptoMode::Weapi => crypto::weapi(&payload),
        CryptoMode::Linux => crypto::linuxapi(&payload),
        CryptoMode::Eapi => crypto::eapi(&signature_path(&request.path), &payload),
    }
}

/// Path the EAPI digest is computed over: always the logical `/api/...`
/// form, whatever was used to address the request.
fn signature_path(path: &str) -> String {
    let path = if is_absolute(path) {
        Url::parse(path).map_or_else(|_| path.to_owned(), |url| url.path().to_owned())
    } else {
        path.to_owned()
    };

    match path.strip_prefix("/eapi/") {
        Some(rest) => format!("/api/{rest}"),
        None => path,
    }
}

/// Decodes a response body to text.
///
/// Bodies starting with the gzip magic or labelled gzip are decompressed.
/// If that fails the raw bytes are read as ISO-8859-1, as is anything that
/// is not valid UTF-8.
#[must_use]
pub fn decode_body(bytes: &[u8], content_encoding: Option<&str>) -> String {
    if is_gzip(bytes, content_encoding) {
        return match gunzip(bytes) {
            Ok(plain) => decode_text(&plain),
            Err(e) => {
                debug!("body is labelled gzip but does not decompress: {e}");
                latin1(bytes)
            }
        };
    }

    decode_text(bytes)
}

/// Decodes a response body the service encrypted on request (`e_r=true`).
///
/// # Errors
///
/// Returns `Decode` if a gzip body does not decompress and `Crypto` if the
/// body does not decrypt.
pub fn decode_encrypted_body(bytes: &[u8], content_encoding: Option<&str>) -> Result<String> {
    let cipher_text = if is_gzip(bytes, content_encoding) {
        gunzip(bytes)?
    } else {
        bytes.to_vec()
    };
    Ok(decode_text(&crypto::eapi_decrypt_response(&cipher_text)?))
}

fn is_gzip(bytes: &[u8], content_encoding: Option<&str>) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
        || content_encoding.is_some_and(|encoding| encoding.to_ascii_lowercase().contains("gzip"))
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut plain = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut plain)?;
    Ok(plain)
}

fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => latin1(bytes),
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Stores the cookies of every `Set-Cookie` header in the session.
fn absorb_cookies(session: &Session, headers: &HeaderMap) {
    session.store_response_cookies(
        headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok()),
    );
}

/// Sends requests on behalf of one [`Session`].
pub struct Transport {
    client: http::Client,
    session: Arc<Session>,
    hosts: Hosts,
}

impl Transport {
    /// Creates a transport for `session`, routed per `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &Config, session: Arc<Session>) -> Result<Self> {
        Ok(Self {
            client: http::Client::new(config)?,
            session,
            hosts: Hosts::from(config),
        })
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    #[must_use]
    pub fn hosts(&self) -> &Hosts {
        &self.hosts
    }

    /// See [`prepare`].
    ///
    /// # Errors
    ///
    /// See [`prepare`].
    pub fn prepare(&self, request: &Request) -> Result<Prepared> {
        prepare(&self.hosts, &self.session, request)
    }

    /// Sends `request` and returns the decoded body.
    ///
    /// Cookies the service sets are stored in the session.
    ///
    /// # Errors
    ///
    /// Returns `Transport` or `Timeout` if no response arrives, and
    /// `Transport` for HTTP errors without a JSON body.
    pub async fn send(&self, request: &Request) -> Result<String> {
        let prepared = self.prepare(request)?;
        let url = prepared.url.clone();
        let http_request =
            self.client
                .request(prepared.method, prepared.url, prepared.headers, prepared.body);

        let response = self.client.execute(http_request).await.inspect_err(|e| {
            warn!("{} {url} failed: {e}", request.method);
        })?;

        let status = response.status();
        absorb_cookies(&self.session, response.headers());
        let content_encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let bytes = response.bytes().await?;
        debug!(
            "{status} {url}: {} bytes{}",
            bytes.len(),
            content_encoding
                .as_deref()
                .map(|encoding| format!(" ({encoding})"))
                .unwrap_or_default()
        );

        let encrypted = request.mode == CryptoMode::Eapi
            && request.params.get("e_r") == Some(&ParamValue::Bool(true));
        let body = if encrypted && status.is_success() {
            decode_encrypted_body(&bytes, content_encoding.as_deref())?
        } else {
            decode_body(&bytes, content_encoding.as_deref())
        };

        if !status.is_success() && serde_json::from_str::<serde_json::Value>(&body).is_err() {
            return Err(Error::transport(format!("{url} returned {status}")));
        }

        Ok(body)
    }

    /// Sends `request` and decodes the JSON response.
    ///
    /// Unknown fields are ignored and drifting number/string types are
    /// accepted where the response types allow it.
    ///
    /// # Errors
    ///
    /// As [`Transport::send`], plus `Decode` for unexpected response shapes
    /// and `Api` for a status code other than `200`.
    pub async fn request_json<T>(&self, request: &Request) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + std::fmt::Debug,
    {
        let body = self.send(request).await?;
        protocol::json(&body, &request.path)
    }
}
