use std::time;

/// Get the current system time in milliseconds from epoch.
///
/// The service stamps its identity cookies with millisecond precision.
///
/// # Panics
///
/// Panics if the system time is before epoch.
#[must_use]
pub fn millis_from_epoch() -> u128 {
    time::SystemTime::now()
        .duration_since(time::UNIX_EPOCH)
        .expect("system time is before epoch")
        .as_millis()
}

/// Masks a value for logging if its key looks like a secret.
///
/// Keeps a short prefix and suffix so that two values can still be told
/// apart in a trace.
#[must_use]
pub fn mask_if_sensitive(key: &str, value: &str) -> String {
    const SENSITIVE: [&str; 10] = [
        "password",
        "passwd",
        "token",
        "csrf",
        "music_u",
        "music_a",
        "cookie",
        "encseckey",
        "params",
        "eparams",
    ];

    let key = key.to_lowercase();
    if !SENSITIVE.iter().any(|needle| key.contains(needle)) {
        return value.to_owned();
    }

    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 12 {
        return String::from("<masked>");
    }

    let prefix: String = chars[..6].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}...{suffix}(len={})", chars.len())
}
