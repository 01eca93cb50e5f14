//! HTTP Digest authentication (RFC 7616, MD5 only).
//!
//! The challenge from the camera's first 401 is cached and reused; each request
//! signed against it carries the next nonce count. A fresh 401 replaces it.

use anyhow::{anyhow, Result};
use rand::RngCore;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    /// True when the server offered `qop=auth`.
    pub qop_auth: bool,
}

impl DigestChallenge {
    /// Parse a `WWW-Authenticate` header value.
    pub fn parse(header: &str) -> Result<Self> {
        let (scheme, params) = header
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_else(|| anyhow!("malformed authenticate header"))?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return Err(anyhow!("unsupported auth scheme '{}'", scheme));
        }

        static PARAM_RE: OnceLock<Regex> = OnceLock::new();
        let re = PARAM_RE.get_or_init(|| {
            Regex::new(r#"([A-Za-z-]+)\s*=\s*(?:"([^"]*)"|([^,\s]+))"#)
                .expect("digest parameter pattern is valid")
        });

        let (mut realm, mut nonce, mut opaque, mut qop_auth) = (None, None, None, false);
        for caps in re.captures_iter(params) {
            let key = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str())
                .to_string();
            match key.as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "qop" => qop_auth = value.split(',').any(|q| q.trim() == "auth"),
                "algorithm" if !value.eq_ignore_ascii_case("md5") => {
                    return Err(anyhow!("unsupported digest algorithm '{}'", value));
                }
                _ => {}
            }
        }

        Ok(Self {
            realm: realm.ok_or_else(|| anyhow!("digest challenge missing realm"))?,
            nonce: nonce.ok_or_else(|| anyhow!("digest challenge missing nonce"))?,
            opaque,
            qop_auth,
        })
    }
}

/// A cached challenge plus the nonce count used against it.
#[derive(Debug)]
pub struct DigestSession {
    challenge: DigestChallenge,
    nonce_count: u32,
}

impl DigestSession {
    pub fn new(challenge: DigestChallenge) -> Self {
        Self {
            challenge,
            nonce_count: 0,
        }
    }

    pub fn nonce_count(&self) -> u32 {
        self.nonce_count
    }

    /// `Authorization` header for one request, advancing the nonce count.
    pub fn authorize(&mut self, user: &str, password: &str, method: &str, uri: &str) -> String {
        self.nonce_count += 1;
        let mut cnonce = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut cnonce);
        authorization_header(
            &self.challenge,
            user,
            password,
            method,
            uri,
            self.nonce_count,
            &hex::encode(cnonce),
        )
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

pub(crate) fn authorization_header(
    challenge: &DigestChallenge,
    user: &str,
    password: &str,
    method: &str,
    uri: &str,
    nonce_count: u32,
    cnonce: &str,
) -> String {
    let ha1 = md5_hex(&format!("{}:{}:{}", user, challenge.realm, password));
    let ha2 = md5_hex(&format!("{}:{}", method, uri));
    let nc = format!("{:08x}", nonce_count);

    let mut header = format!(
        r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", algorithm=MD5"#,
        user, challenge.realm, challenge.nonce, uri
    );
    if challenge.qop_auth {
        let response = md5_hex(&format!(
            "{}:{}:{}:{}:auth:{}",
            ha1, challenge.nonce, nc, cnonce, ha2
        ));
        header.push_str(&format!(
            r#", qop=auth, nc={}, cnonce="{}", response="{}""#,
            nc, cnonce, response
        ));
    } else {
        let response = md5_hex(&format!("{}:{}:{}", ha1, challenge.nonce, ha2));
        header.push_str(&format!(r#", response="{}""#, response));
    }
    if let Some(opaque) = &challenge.opaque {
        header.push_str(&format!(r#", opaque="{}""#, opaque));
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camera_challenge() {
        let challenge = DigestChallenge::parse(
            r#"Digest qop="auth", realm="IP Camera(C6240)", nonce="4e5468694d7a6b:0a1b", stale="FALSE", opaque="""#,
        )
        .unwrap();
        assert_eq!(challenge.realm, "IP Camera(C6240)");
        assert_eq!(challenge.nonce, "4e5468694d7a6b:0a1b");
        assert_eq!(challenge.opaque.as_deref(), Some(""));
        assert!(challenge.qop_auth);
    }

    #[test]
    fn rejects_other_schemes_and_algorithms() {
        assert!(DigestChallenge::parse(r#"Basic realm="x""#).is_err());
        assert!(DigestChallenge::parse(r#"Digest realm="x", nonce="y", algorithm=SHA-256"#).is_err());
        assert!(DigestChallenge::parse(r#"Digest realm="x""#).is_err());
    }

    #[test]
    fn rfc2617_reference_response() {
        // Worked example from RFC 2617 section 3.5.
        let challenge = DigestChallenge {
            realm: "testrealm@host.com".into(),
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".into(),
            opaque: Some("5ccc069c403ebaf9f0171e9517f40e41".into()),
            qop_auth: true,
        };
        let header = authorization_header(
            &challenge,
            "Mufasa",
            "Circle Of Life",
            "GET",
            "/dir/index.html",
            1,
            "0a4f113b",
        );
        assert!(header.contains(r#"response="6629fae49393a05397450978507c4ef1""#));
        assert!(header.contains("nc=00000001"));
        assert!(header.contains(r#"opaque="5ccc069c403ebaf9f0171e9517f40e41""#));
    }

    #[test]
    fn session_increments_nonce_count() {
        let mut session = DigestSession::new(DigestChallenge {
            realm: "r".into(),
            nonce: "n".into(),
            opaque: None,
            qop_auth: true,
        });
        let first = session.authorize("admin", "pw", "PUT", "/a");
        let second = session.authorize("admin", "pw", "PUT", "/a");
        assert!(first.contains("nc=00000001"));
        assert!(second.contains("nc=00000002"));
        assert_eq!(session.nonce_count(), 2);
    }
}
