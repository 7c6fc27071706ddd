//! Per-client identity: cookies, user agent and the generated device and
//! visitor identifiers that the official clients send along with every
//! request.
//!
//! A [`Session`] is created once and shared by `Arc` with the transport. The
//! generated identifiers are computed lazily on first use and then stay
//! fixed for the lifetime of the session, so the service sees one stable
//! visitor instead of a new one per request.
//!
//! # Cookie assembly
//!
//! For every request [`Session::cookies_for`] layers, from strongest to
//! weakest:
//!
//! 1. cookies passed for this request only
//! 2. the session's cookie jar (login tokens, anything absorbed from
//!    `Set-Cookie`)
//! 3. the device identity (`deviceId`, `osver`, `mobilename`)
//! 4. telemetry defaults of the client being impersonated
//! 5. visitor nonces (`_ntes_nuid`, `NMTID`, ...) and, without a login, a
//!    guest `MUSIC_A` token
//!
//! For EAPI requests the result is then cut down to the cookies the mobile
//! client actually sends, unless that was disabled in the configuration.
//!
//! # Cookie jar
//!
//! The jar follows `Set-Cookie` semantics: an expired cookie (`Max-Age=0`
//! or an `Expires` in the past) removes the stored one. All cookies are
//! kept for one origin, whichever of the service's hosts set them.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{MutexGuard, OnceLock, PoisonError},
};

use cookie_store::{CookieStore, RawCookie};
use reqwest_cookie_store::CookieStoreMutex;
use url::Url;
use uuid::Uuid;
use veil::Redact;

use crate::{config::Config, crypto::CryptoMode, error::Result, rand, util};

/// Cookie name to value, sorted by name.
pub type Cookies = BTreeMap<String, String>;

/// Cookies the mobile client sends on EAPI requests.
pub const EAPI_COOKIE_ALLOW_LIST: [&str; 19] = [
    "EVNSM",
    "versioncode",
    "buildver",
    "resolution",
    "MUSIC_U",
    "MUSIC_A",
    "__csrf",
    "JSESSIONID-WYYY",
    "NTES_YD_SESS",
    "P_INFO",
    "S_INFO",
    "NMCID",
    "channel",
    "os",
    "modelCode",
    "distributeChannel",
    "screenType",
    "appver",
    "packageType",
];

/// Telemetry of the Android client, for EAPI requests.
const MOBILE_DEFAULTS: [(&str, &str); 11] = [
    ("EVNSM", "1.0.0"),
    ("versioncode", "3007001"),
    ("buildver", "250103035128"),
    ("resolution", "2269x1080"),
    ("channel", "netease"),
    ("os", "andrcar"),
    ("modelCode", "netease"),
    (
        "distributeChannel",
        "andrcar%24%7B%22channel%22%3A%22netease%22%7D",
    ),
    ("screenType", "other"),
    ("appver", "3.7.01"),
    ("packageType", "release"),
];

/// Telemetry of the desktop client, for WEAPI and LinuxAPI requests.
const DESKTOP_DEFAULTS: [(&str, &str); 8] = [
    ("os", "pc"),
    ("appver", "3.0.18.203152"),
    ("osver", "Microsoft-Windows-10"),
    ("channel", "netease"),
    ("versioncode", "3007001"),
    ("buildver", "250103035128"),
    ("resolution", "2269x1080"),
    ("packageType", "release"),
];

const CONSTANTS: [(&str, &str); 3] = [
    ("WEVNSM", "1.0.0"),
    ("__remember_me", "true"),
    ("ntes_kaola_ad", "1"),
];

/// Device model reported in `mobilename`, the handset of
/// [`crate::transport::MOBILE_USER_AGENT`].
pub const MODEL_NAME: &str = "Redmi 6A";

/// Identifies the device, like the Android client reports its handset.
/// Values are percent-encoded, ready for a `Cookie` header.
#[derive(Clone, Debug, PartialEq, Eq)]
struct DeviceIdentity {
    device_id: String,
    os_version: String,
    model_name: String,
}

impl DeviceIdentity {
    fn generate() -> Self {
        let os_version = sysinfo::System::os_version().unwrap_or_default();
        Self::new(&os_version, MODEL_NAME)
    }

    fn new(os_version: &str, model_name: &str) -> Self {
        let hardware_id = Uuid::new_v4().simple().to_string();
        let raw = format!("null 02:00:00:00:00:00 {} unknown", &hardware_id[..16]);
        trace!("device identity: os version \"{os_version}\", model \"{model_name}\"");

        Self {
            device_id: encode(&raw),
            os_version: encode(os_version),
            model_name: encode(model_name),
        }
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Visitor identifiers shared by all client conventions.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Nonces {
    nuid: String,
    nnid: String,
    nmtid: String,
}

impl Nonces {
    fn generate() -> Self {
        let nuid = rand::hex_digits(32);
        let nnid = format!("{nuid},{}", util::millis_from_epoch());
        Self {
            nuid,
            nnid,
            nmtid: rand::hex_digits(16),
        }
    }
}

/// Cookie jar of a session. Only cookie names show in `Debug`.
#[derive(Default)]
struct Jar(CookieStoreMutex);

impl Jar {
    fn lock(&self) -> MutexGuard<'_, CookieStore> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Jar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.lock().iter_unexpired().map(|cookie| cookie.name().to_owned()))
            .finish()
    }
}

#[derive(Redact)]
pub struct Session {
    cookies: Jar,
    user_agent: String,
    eapi_minimal_cookie: bool,

    device: OnceLock<DeviceIdentity>,
    nonces: OnceLock<Nonces>,
    mobile_client_id: OnceLock<String>,
    desktop_client_id: OnceLock<String>,
    #[redact]
    guest_token: OnceLock<String>,
}

impl Session {
    /// Origin all cookies are stored for.
    const COOKIE_ORIGIN: &'static str = "https://music.163.com/";

    fn cookie_origin() -> Url {
        Url::parse(Self::COOKIE_ORIGIN).expect("invalid cookie origin")
    }

    /// Creates a session with the given cookies and user agent.
    ///
    /// Cookies the jar refuses are logged and skipped.
    #[must_use]
    pub fn new(cookies: Cookies, user_agent: impl Into<String>) -> Self {
        let session = Self {
            cookies: Jar::default(),
            user_agent: user_agent.into(),
            eapi_minimal_cookie: true,

            device: OnceLock::new(),
            nonces: OnceLock::new(),
            mobile_client_id: OnceLock::new(),
            desktop_client_id: OnceLock::new(),
            guest_token: OnceLock::new(),
        };

        for (name, value) in cookies {
            if let Err(e) = session.set_cookie(name.as_str(), value) {
                warn!("ignoring cookie {name}: {e}");
            }
        }

        session
    }

    /// Creates a session from the configured cookie string and user agent.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let cookies = config
            .cookie
            .as_deref()
            .map(parse_cookie_string)
            .unwrap_or_default();

        let mut session = Self::new(cookies, config.user_agent.as_str());
        session.eapi_minimal_cookie = config.eapi_minimal_cookie;
        session
    }

    /// Sets whether EAPI requests only carry allow-listed cookies.
    #[must_use]
    pub fn with_eapi_minimal_cookie(mut self, minimal: bool) -> Self {
        self.eapi_minimal_cookie = minimal;
        self
    }

    /// Overrides the reported OS version and device model. The device id
    /// is still generated.
    #[must_use]
    pub fn with_device(mut self, os_version: &str, model_name: &str) -> Self {
        self.device = OnceLock::from(DeviceIdentity::new(os_version, model_name));
        self
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Whether a non-empty `MUSIC_U` login token is present.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        has_value(&self.cookies(), "MUSIC_U")
    }

    /// Copy of the unexpired cookies in the jar, without generated ones.
    #[must_use]
    pub fn cookies(&self) -> Cookies {
        self.cookies
            .lock()
            .iter_unexpired()
            .map(|cookie| (cookie.name().to_owned(), cookie.value().to_owned()))
            .collect()
    }

    /// Stores a session cookie, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the jar refuses the cookie.
    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let mut cookie = RawCookie::new(name.into(), value.into());
        cookie.set_path("/");
        trace!("storing cookie {}", cookie.name());
        self.cookies.lock().insert_raw(&cookie, &Self::cookie_origin())?;
        Ok(())
    }

    /// Stores the cookies of `Set-Cookie` header values. Expired cookies
    /// remove stored ones; malformed headers are skipped.
    pub fn store_response_cookies<'a>(&self, headers: impl IntoIterator<Item = &'a str>) {
        let cookies = headers
            .into_iter()
            .filter_map(|header| match RawCookie::parse(header.to_owned()) {
                Ok(mut cookie) => {
                    // One origin for all hosts of the service.
                    cookie.unset_domain();
                    cookie.set_path("/");
                    trace!("received cookie {}", cookie.name());
                    Some(cookie)
                }
                Err(e) => {
                    debug!("ignoring malformed cookie: {e}");
                    None
                }
            });

        self.cookies
            .lock()
            .store_response_cookies(cookies, &Self::cookie_origin());
    }

    /// Assembles the cookies to send with a request of the given mode.
    ///
    /// Generated identifiers are memoized: two calls on the same session
    /// yield the same values.
    #[must_use]
    pub fn cookies_for(&self, mode: CryptoMode, extra: &Cookies) -> Cookies {
        let mut cookies = self.cookies();
        cookies.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        let device = self.device.get_or_init(DeviceIdentity::generate);
        put_if_absent(&mut cookies, "deviceId", &device.device_id);
        put_if_absent(&mut cookies, "osver", &device.os_version);
        put_if_absent(&mut cookies, "mobilename", &device.model_name);

        let defaults: &[(&str, &str)] = match mode {
            CryptoMode::Eapi => &MOBILE_DEFAULTS,
            CryptoMode::Weapi | CryptoMode::Linux => &DESKTOP_DEFAULTS,
        };
        for (name, value) in defaults {
            put_if_absent(&mut cookies, name, value);
        }

        let nonces = self.nonces.get_or_init(Nonces::generate);
        put_if_absent(&mut cookies, "_ntes_nuid", &nonces.nuid);
        put_if_absent(&mut cookies, "_ntes_nnid", &nonces.nnid);

        let client_id = self.client_id(mode);
        put_if_absent(&mut cookies, "WNMCID", client_id);
        let wnmcid = cookies["WNMCID"].clone();
        put_if_absent(&mut cookies, "NMCID", &wnmcid);

        for (name, value) in CONSTANTS {
            put_if_absent(&mut cookies, name, value);
        }
        put_if_absent(&mut cookies, "NMTID", &nonces.nmtid);

        if !has_value(&cookies, "MUSIC_U") && !has_value(&cookies, "MUSIC_A") {
            cookies.remove("MUSIC_U");
            let guest = self
                .guest_token
                .get_or_init(|| format!("guest_{}", rand::hex_digits(24)));
            cookies.insert("MUSIC_A".to_owned(), guest.clone());
        }

        if mode == CryptoMode::Eapi && self.eapi_minimal_cookie {
            cookies.retain(|name, _| EAPI_COOKIE_ALLOW_LIST.contains(&name.as_str()));
        }

        cookies
    }

    fn client_id(&self, mode: CryptoMode) -> &str {
        let millis = util::millis_from_epoch();
        match mode {
            CryptoMode::Eapi => self
                .mobile_client_id
                .get_or_init(|| format!("{}.{millis}.01.4", rand::lowercase(6))),
            CryptoMode::Weapi | CryptoMode::Linux => self
                .desktop_client_id
                .get_or_init(|| format!("{}.{millis}.01.0", rand::hex_digits(6))),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn has_value(cookies: &Cookies, name: &str) -> bool {
    cookies.get(name).is_some_and(|value| !value.is_empty())
}

fn put_if_absent(cookies: &mut Cookies, name: &str, value: &str) {
    if !cookies.contains_key(name) {
        cookies.insert(name.to_owned(), value.to_owned());
    }
}

/// Parses the value of a `Cookie` header, `name=value; name=value`.
/// Malformed pairs are skipped, names and values are trimmed.
#[must_use]
pub fn parse_cookie_string(cookie: &str) -> Cookies {
    RawCookie::split_parse(cookie)
        .filter_map(std::result::Result::ok)
        .map(|cookie| (cookie.name().to_owned(), cookie.value().to_owned()))
        .collect()
}

/// Renders cookies as the value of a `Cookie` header.
#[must_use]
pub fn cookie_header(cookies: &Cookies) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Value of the `__csrf` cookie, or empty without one.
#[must_use]
pub fn csrf_token(cookies: &Cookies) -> &str {
    cookies.get("__csrf").map_or("", String::as_str)
}
