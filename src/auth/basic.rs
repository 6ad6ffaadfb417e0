//! HTTP Basic credentials (`Authorization: Basic <base64(user:pass)>`).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

/// Username and password decoded from a Basic header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Why a header could not be read as Basic credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedHeader {
    #[error("authorization scheme is not Basic")]
    WrongScheme,
    #[error("credentials are not valid base64")]
    InvalidBase64,
    #[error("credentials are not valid UTF-8")]
    InvalidUtf8,
    #[error("credentials must be 'username:password'")]
    MissingSeparator,
}

/// Parse the value of an `Authorization` header.
///
/// The scheme name is matched case-insensitively and the payload is split at
/// the first `:`, so passwords may contain colons.
pub fn parse_basic_credentials(header: &str) -> Result<BasicCredentials, MalformedHeader> {
    let header = header.trim();
    let (scheme, payload) = header
        .split_once(' ')
        .ok_or(MalformedHeader::WrongScheme)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(MalformedHeader::WrongScheme);
    }

    let decoded = STANDARD
        .decode(payload.trim())
        .map_err(|_| MalformedHeader::InvalidBase64)?;
    let decoded = String::from_utf8(decoded).map_err(|_| MalformedHeader::InvalidUtf8)?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(MalformedHeader::MissingSeparator)?;

    Ok(BasicCredentials {
        username: username.to_owned(),
        password: password.to_owned(),
    })
}

/// Build a header value for the given pair. Used by the CLI client and tests.
pub fn encode_basic_credentials(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}
