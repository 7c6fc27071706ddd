//! Request signing for the three client conventions of the music service.
//!
//! The service only accepts request bodies that were obfuscated exactly the
//! way one of its official clients does it:
//!
//! * [`CryptoMode::Weapi`] - the legacy web client. Two rounds of
//!   AES-128-CBC (a fixed preset key, then a fresh random key), with the
//!   random key sent alongside under raw RSA.
//! * [`CryptoMode::Linux`] - the Linux desktop client. One round of
//!   AES-128-ECB, uppercase hex.
//! * [`CryptoMode::Eapi`] - the mobile clients. AES-128-ECB over the path,
//!   the payload and an MD5 integrity digest, uppercase hex.
//!
//! # Raw RSA
//!
//! The `encSecKey` of WEAPI is textbook RSA: `m^e mod n` with **no padding
//! scheme at all**. The web client's crypto library did it this way, so the
//! server decrypts without unpadding. Feeding the key through PKCS#1 or OAEP
//! produces a payload the server rejects. Do not "fix" this.
//!
//! # Example
//!
//! ```rust
//! use ncmapi::crypto;
//!
//! let body = crypto::eapi("/api/song/lyric", r#"{"id":1}"#)?;
//! assert_eq!(crypto::eapi_decrypt(&body["params"])?, r#"{"id":1}"#);
//! ```

use std::{collections::BTreeMap, fmt, sync::LazyLock};

use aes::Aes128;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use md5::{Digest, Md5};
use num_bigint::BigUint;

use crate::{
    error::{Error, Result},
    rand,
};

type CbcEncryptor = cbc::Encryptor<Aes128>;
type CbcDecryptor = cbc::Decryptor<Aes128>;
type EcbEncryptor = ecb::Encryptor<Aes128>;
type EcbDecryptor = ecb::Decryptor<Aes128>;

/// Key of the first WEAPI encryption round.
const PRESET_KEY: &[u8; 16] = b"0CoJUm6Qyw8W8jud";

/// IV of both WEAPI encryption rounds.
const IV: &[u8; 16] = b"0102030405060708";

/// Key of the LinuxAPI encryption.
const LINUXAPI_KEY: &[u8; 16] = b"rFgB&h#%2?^eDg:Q";

/// Key of the EAPI encryption, for requests and encrypted responses.
const EAPI_KEY: &[u8; 16] = b"e82ckenh8dichen8";

/// Separator between path, payload and digest in the EAPI plaintext.
const EAPI_SEPARATOR: &str = "-36cd479b6b5-";

/// Public exponent of the WEAPI key.
const RSA_EXPONENT: u32 = 0x0001_0001;

/// 1024-bit modulus of the WEAPI public key.
const RSA_MODULUS_HEX: &str = "00e0b509f6259df8642dbc35662901477df22677ec152b5ff68ace615bb7b7\
    25152b3ab17a876aea8a5aa76d2e417629ec4ee341f56135fccf695280104e0312ecbda92557c93870114af6c9d\
    05c4f7f0c3685b7a46bee255932575cce10b424d813cfe4875d3e82047b97ddef52741d546b8e289dc6935b3ece\
    0462db0a22b8e7";

/// Width of `encSecKey` in hex digits: one 1024-bit block.
pub const ENC_SEC_KEY_LEN: usize = 256;

/// Length of the random WEAPI secret key.
pub const SECRET_KEY_LEN: usize = 16;

static RSA_MODULUS: LazyLock<BigUint> = LazyLock::new(|| {
    BigUint::parse_bytes(RSA_MODULUS_HEX.as_bytes(), 16).expect("invalid rsa modulus")
});

/// Signing convention of a request.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum CryptoMode {
    /// Legacy web client: two-stage AES-CBC with an RSA-wrapped random key.
    #[default]
    Weapi,

    /// Linux desktop client: AES-ECB with a fixed key.
    Linux,

    /// Mobile client: AES-ECB with an embedded MD5 digest.
    Eapi,
}

impl fmt::Display for CryptoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weapi => write!(f, "weapi"),
            Self::Linux => write!(f, "linuxapi"),
            Self::Eapi => write!(f, "eapi"),
        }
    }
}

/// Encoded form fields, ready to be sent as `application/x-www-form-urlencoded`.
pub type SignedBody = BTreeMap<&'static str, String>;

/// Signs `plaintext` the way the legacy web client does.
///
/// A fresh secret key is generated on every call; the service expects
/// per-request keys.
///
/// # Errors
///
/// Only fails if the AES primitives reject their key material, which
/// cannot happen with the built-in keys.
pub fn weapi(plaintext: &str) -> Result<SignedBody> {
    let secret = rand::alphanumeric(SECRET_KEY_LEN);
    weapi_with_secret(plaintext, &secret)
}

/// Signs `plaintext` the way the legacy web client does, with a caller
/// provided secret key.
///
/// # Errors
///
/// Returns `Crypto` if `secret` is not 16 bytes long.
pub fn weapi_with_secret(plaintext: &str, secret: &str) -> Result<SignedBody> {
    let stage1 = BASE64.encode(aes_cbc_encrypt(plaintext.as_bytes(), PRESET_KEY, IV)?);
    let params = BASE64.encode(aes_cbc_encrypt(stage1.as_bytes(), secret.as_bytes(), IV)?);

    let reversed: Vec<u8> = secret.bytes().rev().collect();
    let enc_sec_key = rsa_encrypt_raw(&reversed);

    Ok(SignedBody::from([("params", params), ("encSecKey", enc_sec_key)]))
}

/// Reverses both WEAPI rounds given the secret key that was used.
///
/// # Errors
///
/// Returns `Crypto` on malformed base64, a wrong key or broken padding.
pub fn weapi_decrypt(params: &str, secret: &str) -> Result<String> {
    let stage1 = aes_cbc_decrypt(&BASE64.decode(params)?, secret.as_bytes(), IV)?;
    let plaintext = aes_cbc_decrypt(&BASE64.decode(stage1)?, PRESET_KEY, IV)?;
    String::from_utf8(plaintext).map_err(Into::into)
}

/// Signs `plaintext` the way the Linux desktop client does.
///
/// # Errors
///
/// Only fails if the AES primitives reject their key material.
pub fn linuxapi(plaintext: &str) -> Result<SignedBody> {
    let eparams = hex::encode_upper(aes_ecb_encrypt(plaintext.as_bytes(), LINUXAPI_KEY)?);
    Ok(SignedBody::from([("eparams", eparams)]))
}

/// Reverses [`linuxapi`].
///
/// # Errors
///
/// Returns `Crypto` on malformed hex or broken padding.
pub fn linuxapi_decrypt(eparams: &str) -> Result<String> {
    let plaintext = aes_ecb_decrypt(&hex::decode(eparams)?, LINUXAPI_KEY)?;
    String::from_utf8(plaintext).map_err(Into::into)
}

/// Signs `plaintext` the way the mobile client does.
///
/// `path` must be the logical `/api/...` path, not the `/eapi/...` path the
/// request is sent to: the server recomputes the digest from the former.
///
/// # Errors
///
/// Only fails if the AES primitives reject their key material.
pub fn eapi(path: &str, plaintext: &str) -> Result<SignedBody> {
    let digest = format!(
        "{:x}",
        Md5::digest(format!("nobody{path}use{plaintext}md5forencrypt"))
    );
    let composite = format!("{path}{EAPI_SEPARATOR}{plaintext}{EAPI_SEPARATOR}{digest}");

    let params = hex::encode_upper(aes_ecb_encrypt(composite.as_bytes(), EAPI_KEY)?);
    Ok(SignedBody::from([("params", params)]))
}

/// Recovers the payload of an EAPI `params` field.
///
/// The digest is not verified; it only exists for the server. If the
/// plaintext does not contain both separators, it is returned whole.
///
/// # Errors
///
/// Returns `Crypto` on malformed hex, broken padding or a non UTF-8 payload.
pub fn eapi_decrypt(params: &str) -> Result<String> {
    let plaintext = String::from_utf8(aes_ecb_decrypt(&hex::decode(params)?, EAPI_KEY)?)?;

    let mut segments = plaintext.split(EAPI_SEPARATOR);
    match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => Ok(payload.to_owned()),
        _ => Ok(plaintext),
    }
}

/// Decrypts a response body that the service encrypted because the request
/// asked for it with `e_r=true`.
///
/// # Errors
///
/// Returns `Crypto` if the body is not a whole number of AES blocks or the
/// padding is broken.
pub fn eapi_decrypt_response(body: &[u8]) -> Result<Vec<u8>> {
    aes_ecb_decrypt(body, EAPI_KEY)
}

/// Raw RSA: interprets `plaintext` as a big-endian unsigned integer and
/// returns `plaintext^e mod n` as lowercase hex, left-padded with zeros to
/// [`ENC_SEC_KEY_LEN`] digits.
///
/// No padding scheme is applied. See the module documentation.
#[must_use]
pub fn rsa_encrypt_raw(plaintext: &[u8]) -> String {
    let message = BigUint::from_bytes_be(plaintext);
    let cipher = message.modpow(&BigUint::from(RSA_EXPONENT), &RSA_MODULUS);
    format!("{:0>width$}", cipher.to_str_radix(16), width = ENC_SEC_KEY_LEN)
}

fn aes_cbc_encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    Ok(CbcEncryptor::new_from_slices(key, iv)?.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn aes_cbc_decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    CbcDecryptor::new_from_slices(key, iv)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(Into::into)
}

fn aes_ecb_encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    Ok(EcbEncryptor::new_from_slice(key)?.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn aes_ecb_decrypt(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(Error::crypto(format!(
            "cipher text of {} bytes is not a whole number of blocks",
            ciphertext.len()
        )));
    }

    EcbDecryptor::new_from_slice(key)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const PAYLOAD: &str = r#"{"threadId":"R_SO_4_186016","pageNo":1,"csrf_token":""}"#;

    fn parse_hex(hex: &str) -> BigUint {
        BigUint::parse_bytes(hex.as_bytes(), 16).unwrap()
    }

    #[test]
    fn eapi_round_trip() {
        for (path, payload) in [
            ("/api/song/lyric", r#"{"id":186016}"#),
            ("/api/cloudsearch/pc", r#"{"s":"晴天","type":1}"#),
            ("/api/v1/empty", ""),
            ("/api/odd", "-36cd479b6b5-"),
        ] {
            let body = eapi(path, payload).unwrap();
            assert_eq!(body.keys().copied().collect::<Vec<_>>(), ["params"]);
            let params = &body["params"];
            assert!(params.chars().all(|c| matches!(c, '0'..='9' | 'A'..='F')));
            if payload.contains(EAPI_SEPARATOR) {
                // The payload itself is split, so only its head survives.
                assert_eq!(eapi_decrypt(params).unwrap(), "");
            } else {
                assert_eq!(eapi_decrypt(params).unwrap(), payload);
            }
        }
    }

    #[test]
    fn eapi_digest_covers_the_logical_path() {
        let body = eapi("/api/song/lyric", PAYLOAD).unwrap();
        let plaintext = String::from_utf8(
            aes_ecb_decrypt(&hex::decode(&body["params"]).unwrap(), EAPI_KEY).unwrap(),
        )
        .unwrap();

        let digest = format!(
            "{:x}",
            Md5::digest(format!("nobody/api/song/lyricuse{PAYLOAD}md5forencrypt"))
        );
        assert_eq!(
            plaintext,
            format!("/api/song/lyric-36cd479b6b5-{PAYLOAD}-36cd479b6b5-{digest}")
        );
    }

    #[test]
    fn eapi_decrypt_without_separators_returns_everything() {
        let params = hex::encode_upper(aes_ecb_encrypt(b"plain", EAPI_KEY).unwrap());
        assert_eq!(eapi_decrypt(&params).unwrap(), "plain");
    }

    #[test]
    fn malformed_hex_is_rejected() {
        let err = eapi_decrypt("ABC").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Crypto);

        let err = eapi_decrypt("ZZ").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Crypto);

        // Valid hex but not a whole block must not be truncated into one.
        let body = eapi("/api/x", PAYLOAD).unwrap();
        let truncated = &body["params"][..body["params"].len() - 2];
        assert_eq!(eapi_decrypt(truncated).unwrap_err().kind, ErrorKind::Crypto);
    }

    #[test]
    fn linuxapi_round_trip() {
        let body = linuxapi(PAYLOAD).unwrap();
        let eparams = &body["eparams"];
        assert_eq!(eparams, &eparams.to_uppercase());
        assert_eq!(linuxapi_decrypt(eparams).unwrap(), PAYLOAD);
    }

    #[test]
    fn weapi_known_secret() {
        let secret = "abcdefghijklmnop";
        let body = weapi_with_secret(PAYLOAD, secret).unwrap();
        assert_eq!(
            body.keys().copied().collect::<Vec<_>>(),
            ["encSecKey", "params"]
        );

        // Independently undo both rounds.
        let stage1 = aes_cbc_decrypt(
            &BASE64.decode(&body["params"]).unwrap(),
            secret.as_bytes(),
            IV,
        )
        .unwrap();
        let plaintext =
            aes_cbc_decrypt(&BASE64.decode(&stage1).unwrap(), PRESET_KEY, IV).unwrap();
        assert_eq!(plaintext, PAYLOAD.as_bytes());
        assert_eq!(weapi_decrypt(&body["params"], secret).unwrap(), PAYLOAD);

        // The key travels reversed.
        let expected = BigUint::from_bytes_be(b"ponmlkjihgfedcba")
            .modpow(&BigUint::from(65_537_u32), &RSA_MODULUS);
        assert_eq!(parse_hex(&body["encSecKey"]), expected);
    }

    #[test]
    fn weapi_generates_a_fresh_secret_per_call() {
        let first = weapi(PAYLOAD).unwrap();
        let second = weapi(PAYLOAD).unwrap();
        assert_ne!(first["encSecKey"], second["encSecKey"]);
        assert_ne!(first["params"], second["params"]);
    }

    #[test]
    fn enc_sec_key_is_always_256_digits() {
        assert_eq!(rsa_encrypt_raw(&[]), "0".repeat(ENC_SEC_KEY_LEN));
        assert_eq!(
            rsa_encrypt_raw(&[0, 0, 1]),
            format!("{}1", "0".repeat(ENC_SEC_KEY_LEN - 1))
        );

        for byte in 0..=u8::MAX {
            let key = rsa_encrypt_raw(&[byte]);
            assert_eq!(key.len(), ENC_SEC_KEY_LEN);
            assert!(key.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        }

        for _ in 0..32 {
            let body = weapi(PAYLOAD).unwrap();
            assert_eq!(body["encSecKey"].len(), ENC_SEC_KEY_LEN);
        }
    }

    #[test]
    fn enc_sec_key_is_unpadded_rsa() {
        // Textbook RSA is multiplicative; any padding scheme breaks this.
        let two = parse_hex(&rsa_encrypt_raw(&[2]));
        let three = parse_hex(&rsa_encrypt_raw(&[3]));
        let six = parse_hex(&rsa_encrypt_raw(&[6]));
        assert_eq!((two * three) % &*RSA_MODULUS, six);
    }

    #[test]
    fn modulus_is_1024_bits() {
        assert_eq!(RSA_MODULUS.bits(), 1024);
    }

    #[test]
    fn encrypted_response_body() {
        let body = aes_ecb_encrypt(br#"{"code":200}"#, EAPI_KEY).unwrap();
        assert_eq!(eapi_decrypt_response(&body).unwrap(), br#"{"code":200}"#);
        assert!(eapi_decrypt_response(b"{}").is_err());
    }
}
