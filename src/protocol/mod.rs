//! Request and response types shared by all endpoints.
//!
//! # Submodules
//!
//! * [`comment`] - comment threads, floors and likes
//! * [`search`] - search results and suggestions
//! * [`song`] - playback URLs and lyrics
//! * [`playlist`] - playlist details
//! * [`user`] - user profiles
//!
//! # Requests
//!
//! Every call is described by a [`Request`]: a logical path, an HTTP
//! method, the signing convention and a map of [`Params`]. Parameters are a
//! closed set of JSON scalars, so serializing them cannot fail and cannot
//! guess.
//!
//! ```rust
//! use ncmapi::{crypto::CryptoMode, protocol::Request};
//!
//! let request = Request::post("/api/song/lyric", CryptoMode::Weapi)
//!     .param("id", 186_016)
//!     .param("lv", -1);
//! assert_eq!(request.params.to_json(), r#"{"id":186016,"lv":-1}"#);
//! ```
//!
//! # Responses
//!
//! All endpoints answer with an envelope carrying a status `code` next to
//! the payload fields. [`Response`] captures both; [`Response::into_result`]
//! turns anything but `200` into an `Api` error.

pub mod comment;
pub mod playlist;
pub mod search;
pub mod song;
pub mod user;

use std::fmt::{self, Debug};

use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};

use crate::{
    crypto::CryptoMode,
    error::{Error, Result},
    session::Cookies,
};

/// Status code of a successful response.
pub const SUCCESS: i64 = 200;

/// Single request parameter.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Num(i64),
    Float(f64),
    Bool(bool),
}

/// Formats the value as it appears in a query string: strings unquoted.
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Num(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

macro_rules! impl_from_integer {
    ($($int:ty),*) => {
        $(
            impl From<$int> for ParamValue {
                fn from(value: $int) -> Self {
                    Self::Num(i64::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

/// Ids beyond `i64::MAX` are sent as strings rather than wrapped.
impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Str(value.to_string()), Self::Num)
    }
}

/// Request parameters in insertion order.
///
/// Inserting an existing key replaces its value in place, so the order of
/// the serialized JSON only depends on the first insertion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(Vec<(String, ParamValue)>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.0.push((key, value)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compact JSON object, keys in insertion order.
    #[must_use]
    pub fn to_json(&self) -> String {
        // Strings, integers and booleans always serialize. Non-finite floats
        // become `null`, as `serde_json` does for them.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

impl Serialize for Params {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Method {
    Get,
    #[default]
    Post,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// Description of one API call, built fresh for every call.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// Logical `/api/...` path, any other path, or an absolute URL.
    pub path: String,
    pub method: Method,
    pub params: Params,
    pub mode: CryptoMode,
    /// Cookies for this call only, on top of the session's.
    pub cookies: Cookies,
}

impl Request {
    #[must_use]
    pub fn post(path: impl Into<String>, mode: CryptoMode) -> Self {
        Self {
            path: path.into(),
            method: Method::Post,
            params: Params::new(),
            mode,
            cookies: Cookies::new(),
        }
    }

    /// GET requests are sent unsigned; `mode` only affects path, host and
    /// headers.
    #[must_use]
    pub fn get(path: impl Into<String>, mode: CryptoMode) -> Self {
        Self {
            method: Method::Get,
            ..Self::post(path, mode)
        }
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key, value);
        self
    }

    #[must_use]
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }
}

/// Envelope of every response.
///
/// ```json
/// {
///     "code": 200,
///     "message": null,
///     "data": { ... }
/// }
/// ```
///
/// The payload fields sit next to `code`, so `T` is flattened into the
/// envelope. Some endpoints name the message `msg`.
#[derive(Clone, PartialEq, Deserialize, Debug)]
pub struct Response<T> {
    #[serde(default = "default_code")]
    pub code: i64,

    #[serde(default, alias = "msg")]
    pub message: Option<String>,

    #[serde(flatten)]
    pub payload: T,
}

fn default_code() -> i64 {
    SUCCESS
}

impl<T> Response<T> {
    /// Returns the payload of a successful response.
    ///
    /// # Errors
    ///
    /// Returns `Api` for any `code` other than `200`.
    pub fn into_result(self) -> Result<T> {
        if self.code == SUCCESS {
            Ok(self.payload)
        } else {
            Err(Error::api(self.code, self.message.as_deref()))
        }
    }
}

/// Payload of endpoints that only acknowledge.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct Ack {}

/// Parses a response body, logging what could not be parsed.
///
/// # Errors
///
/// Returns `Decode` if the body is not JSON or does not match `T`, and
/// `Api` if the service reported a failure.
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    // Check the status first: failures usually lack the payload fields.
    if let Ok(status) = serde_json::from_str::<Response<Ack>>(body) {
        if status.code != SUCCESS {
            warn!(
                "{origin}: service returned code {} ({})",
                status.code,
                status.message.as_deref().unwrap_or("no message")
            );
            return Err(Error::api(status.code, status.message.as_deref()));
        }
    }

    match serde_json::from_str::<Response<T>>(body) {
        Ok(response) => {
            trace!("{origin}: {:#?}", response.payload);
            response.into_result()
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                debug!("{origin}: unexpected response shape ({e})");
                trace!("{origin}: {json:#?}");
            } else {
                error!("{origin}: failed parsing response ({e})");
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}
