use crate::{Algorithm, Error, HttpMethod, Qop, Result};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use rand::Rng;

//region Ha1

/// Pre-hashed credential: `H(username:realm:password)`.
///
/// Wrapped so the hash never ends up in logs or Debug output. The server
/// stores and compares this value only; it never sees the plain password.
#[derive(Clone)]
pub struct Ha1(SecretString);

impl Ha1 {
    pub fn new(hash: impl Into<String>) -> Self {
        Ha1(SecretString::new(hash.into()))
    }

    /// The hex digest itself, for use as a hash input.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Ha1 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Ha1(<redacted>)")
    }
}

impl PartialEq for Ha1 {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

//endregion

//region DigestContext

/// One client authentication attempt, as parsed from the value of the
/// `Authorization` (or `Proxy-Authorization`) header.
///
/// Fields are kept exactly as submitted; nothing here is normalized or
/// checked. Hex-decoding `nc` and vetting the directives against server
/// policy happens during validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestContext {
    pub username: String,
    pub realm: String,
    /// Server nonce the client is responding to
    pub nonce: String,
    pub uri: String,
    /// The response digest computed by the client
    pub response: String,
    /// Algorithm as sent; absent means MD5 per the RFCs
    pub algorithm: Option<String>,
    /// Client nonce
    pub cnonce: String,
    pub opaque: Option<String>,
    pub qop: String,
    /// Request counter for this nonce, base-16, as submitted
    pub nc: String,
    pub auth_param: Option<String>,
}

impl DigestContext {
    /// Construct from an `Authorization` header value.
    ///
    /// # Errors
    /// If the header is malformed (missing a closing quote, missing any of
    /// the directives validation needs, etc.)
    pub fn parse(input: &str) -> Result<Self> {
        let mut rest = input.trim();
        if let Some(stripped) = rest.strip_prefix("Digest") {
            rest = stripped;
        }

        let mut kv = parse_directives(rest)?;

        Ok(DigestContext {
            username: take_required(&mut kv, "username", input)?,
            realm: take_required(&mut kv, "realm", input)?,
            nonce: take_required(&mut kv, "nonce", input)?,
            uri: take_required(&mut kv, "uri", input)?,
            response: take_required(&mut kv, "response", input)?,
            algorithm: kv.remove("algorithm"),
            cnonce: take_required(&mut kv, "cnonce", input)?,
            opaque: kv.remove("opaque"),
            qop: take_required(&mut kv, "qop", input)?,
            nc: take_required(&mut kv, "nc", input)?,
            auth_param: kv.remove("auth-param"),
        })
    }
}

impl FromStr for DigestContext {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        Self::parse(input)
    }
}

fn take_required(
    kv: &mut HashMap<String, String>,
    key: &'static str,
    header: &str,
) -> Result<String> {
    kv.remove(key)
        .ok_or_else(|| Error::MissingRequired(key, header.into()))
}

/// Split a digest header's directive list into a key-value map.
///
/// Handles both quoted values (with backslash escapes) and plain tokens
/// terminated by a comma or whitespace.
pub fn parse_directives(input: &str) -> Result<HashMap<String, String>> {
    #[derive(Debug)]
    enum State {
        Whitespace,
        Name(usize),
        ValueStart,
        Quoted,
        QuotedEscape,
        Plain,
    }

    let mut state = State::Whitespace;
    let mut parsed = HashMap::new();
    let mut name: Option<&str> = None;
    let mut value = String::new();

    for (pos, c) in input.char_indices() {
        state = match state {
            State::Whitespace => {
                if c.is_alphabetic() {
                    State::Name(pos)
                } else {
                    State::Whitespace
                }
            }
            State::Name(start) => {
                if c == '=' {
                    name = Some(&input[start..pos]);
                    State::ValueStart
                } else {
                    State::Name(start)
                }
            }
            State::ValueStart => {
                value.clear();
                if c == '"' {
                    State::Quoted
                } else {
                    value.push(c);
                    State::Plain
                }
            }
            State::Quoted => match c {
                '"' => {
                    if let Some(key) = name.take() {
                        parsed.insert(key.to_string(), value.clone());
                    }
                    State::Whitespace
                }
                '\\' => State::QuotedEscape,
                _ => {
                    value.push(c);
                    State::Quoted
                }
            },
            State::QuotedEscape => {
                value.push(c);
                State::Quoted
            }
            State::Plain => {
                if c == ',' || c.is_ascii_whitespace() {
                    if let Some(key) = name.take() {
                        parsed.insert(key.to_string(), value.clone());
                    }
                    State::Whitespace
                } else {
                    value.push(c);
                    State::Plain
                }
            }
        };
    }

    match state {
        State::Plain => {
            if let Some(key) = name.take() {
                parsed.insert(key.to_string(), value);
            }
        }
        State::Whitespace => {}
        other => {
            return Err(Error::InvalidHeaderSyntax(format!(
                "unexpected end state {:?}",
                other
            )))
        }
    }

    Ok(parsed)
}

//endregion

//region Response digest

/// Recompute the response digest the client should have produced.
///
/// `nc` is the counter string exactly as submitted; the client hashed the
/// raw directive value, so the server must as well.
pub(crate) fn expected_response(
    algorithm: Algorithm,
    ha1: &Ha1,
    method: HttpMethod<'_>,
    uri: &str,
    body: Option<&[u8]>,
    nonce: &str,
    nc: &str,
    cnonce: &str,
    qop: Qop,
) -> String {
    let ha1 = if algorithm.sess {
        algorithm.hash_str(&format!(
            "{ha1}:{nonce}:{cnonce}",
            ha1 = ha1.expose(),
            nonce = nonce,
            cnonce = cnonce
        ))
    } else {
        ha1.expose().to_string()
    };

    let ha2 = match qop {
        Qop::AUTH => algorithm.hash_str(&format!("{}:{}", method, uri)),
        Qop::AUTH_INT => {
            let body_hash = algorithm.hash(body.unwrap_or(&[]));
            algorithm.hash_str(&format!("{}:{}:{}", method, uri, body_hash))
        }
    };

    algorithm.hash_str(&format!(
        "{ha1}:{nonce}:{nc}:{cnonce}:{qop}:{ha2}",
        ha1 = ha1,
        nonce = nonce,
        nc = nc,
        cnonce = cnonce,
        qop = qop,
        ha2 = ha2
    ))
}

/// Fresh server nonce: 16 random bytes, hex-encoded.
pub(crate) fn generate_nonce() -> String {
    let mut rng = rand::thread_rng();
    let nonce_bytes: [u8; 16] = rng.gen();
    hex::encode(nonce_bytes)
}

//endregion

//region Challenge

/// A `WWW-Authenticate` (or `Proxy-Authenticate`) header value to send with
/// a 401/407 response.
///
/// Obtained from [`StandaloneChecker::issue_challenge`](crate::StandaloneChecker::issue_challenge),
/// which registers the fresh nonce so the client's first use of it can be
/// validated. Render with the Display trait.
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    pub realm: String,
    /// URIs this challenge applies to
    pub domain: Vec<String>,
    /// The freshly issued server nonce
    pub nonce: String,
    pub opaque: Option<String>,
    /// True when re-challenging a client whose nonce expired, telling it to
    /// retry with the same credentials rather than re-prompt the user
    pub stale: bool,
    pub algorithm: Algorithm,
    /// Qop options offered to the client
    pub qop: Vec<Qop>,
}

impl Display for Challenge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Digest ")?;

        f.write_fmt(format_args!("realm=\"{}\"", quote(&self.realm)))?;

        if !self.domain.is_empty() {
            let domains = self.domain.join(" ");
            f.write_fmt(format_args!(", domain=\"{}\"", quote(&domains)))?;
        }

        f.write_fmt(format_args!(", nonce=\"{}\"", quote(&self.nonce)))?;

        if let Some(opaque) = &self.opaque {
            f.write_fmt(format_args!(", opaque=\"{}\"", quote(opaque)))?;
        }

        if self.stale {
            f.write_str(", stale=true")?;
        }

        f.write_fmt(format_args!(", algorithm={}", self.algorithm))?;

        let qops = self
            .qop
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        f.write_fmt(format_args!(", qop=\"{}\"", qops))?;

        Ok(())
    }
}

/// Backslash quoting for values rendered inside a quoted-string.
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

//endregion

//region TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlgorithmType;

    #[test]
    fn test_parse_directives() {
        {
            let src = r#"
               username="Mufasa",
               realm="testrealm@host.com",
               qop=auth,
               algorithm=MD5,
               nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093",
               nc=00000001,
               opaque="5ccc069c403ebaf9f0171e9517f40e41"
            "#;

            let map = parse_directives(src).unwrap();

            assert_eq!(map.get("username").unwrap(), "Mufasa");
            assert_eq!(map.get("realm").unwrap(), "testrealm@host.com");
            assert_eq!(map.get("qop").unwrap(), "auth");
            assert_eq!(map.get("algorithm").unwrap(), "MD5");
            assert_eq!(
                map.get("nonce").unwrap(),
                "dcd98b7102dd2f0e8b11d0f600bfb0c093"
            );
            assert_eq!(map.get("nc").unwrap(), "00000001");
            assert_eq!(
                map.get("opaque").unwrap(),
                "5ccc069c403ebaf9f0171e9517f40e41"
            );
        }

        {
            let src = r#"realm="api@example.org""#;
            let map = parse_directives(src).unwrap();
            assert_eq!(map.get("realm").unwrap(), "api@example.org");
        }

        {
            let src = r#"realm=api@example.org"#;
            let map = parse_directives(src).unwrap();
            assert_eq!(map.get("realm").unwrap(), "api@example.org");
        }

        {
            let map = parse_directives("").unwrap();
            assert!(map.is_empty());
        }
    }

    #[test]
    fn test_parse_directives_quoted_escapes() {
        let src = r#"realm="a long realm with\\, weird \" characters""#;
        let map = parse_directives(src).unwrap();
        assert_eq!(
            map.get("realm").unwrap(),
            "a long realm with\\, weird \" characters"
        );
    }

    #[test]
    fn test_parse_directives_unterminated_quote() {
        let src = r#"realm="unterminated"#;
        assert!(matches!(
            parse_directives(src),
            Err(Error::InvalidHeaderSyntax(_))
        ));
    }

    #[test]
    fn test_context_parse() {
        // the client response from RFC 2617 section 3.5
        let src = r#"Digest username="Mufasa",
             realm="testrealm@host.com",
             nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093",
             uri="/dir/index.html",
             qop=auth,
             nc=00000001,
             cnonce="0a4f113b",
             response="6629fae49393a05397450978507c4ef1",
             opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

        let ctx = DigestContext::parse(src).unwrap();

        assert_eq!(
            ctx,
            DigestContext {
                username: "Mufasa".to_string(),
                realm: "testrealm@host.com".to_string(),
                nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".to_string(),
                uri: "/dir/index.html".to_string(),
                response: "6629fae49393a05397450978507c4ef1".to_string(),
                algorithm: None,
                cnonce: "0a4f113b".to_string(),
                opaque: Some("5ccc069c403ebaf9f0171e9517f40e41".to_string()),
                qop: "auth".to_string(),
                nc: "00000001".to_string(),
                auth_param: None,
            }
        );
    }

    #[test]
    fn test_context_parse_missing_response() {
        let src = r#"Digest username="Mufasa", realm="r", nonce="n", uri="/", qop=auth, nc=00000001, cnonce="abc""#;
        assert_eq!(
            DigestContext::parse(src),
            Err(Error::MissingRequired("response", src.to_string()))
        );
    }

    #[test]
    fn test_expected_response_rfc2617() {
        let ha1 = Ha1::new("939e7578ed9e3c518a452acee763bce9");
        let response = expected_response(
            Algorithm::default(),
            &ha1,
            HttpMethod::GET,
            "/dir/index.html",
            None,
            "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            "00000001",
            "0a4f113b",
            Qop::AUTH,
        );
        assert_eq!(response, "6629fae49393a05397450978507c4ef1");
    }

    #[test]
    fn test_expected_response_changes_with_nc() {
        let ha1 = Ha1::new("939e7578ed9e3c518a452acee763bce9");
        let make = |nc: &str| {
            expected_response(
                Algorithm::default(),
                &ha1,
                HttpMethod::GET,
                "/dir/index.html",
                None,
                "dcd98b7102dd2f0e8b11d0f600bfb0c093",
                nc,
                "0a4f113b",
                Qop::AUTH,
            )
        };
        assert_ne!(make("00000001"), make("00000002"));
    }

    #[test]
    fn test_expected_response_session_variant() {
        let ha1 = Ha1::new("939e7578ed9e3c518a452acee763bce9");
        let sess = expected_response(
            Algorithm::new(AlgorithmType::MD5, true),
            &ha1,
            HttpMethod::GET,
            "/dir/index.html",
            None,
            "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            "00000001",
            "0a4f113b",
            Qop::AUTH,
        );
        let plain = expected_response(
            Algorithm::default(),
            &ha1,
            HttpMethod::GET,
            "/dir/index.html",
            None,
            "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            "00000001",
            "0a4f113b",
            Qop::AUTH,
        );
        assert_ne!(sess, plain);
    }

    #[test]
    fn test_expected_response_auth_int_hashes_body() {
        let ha1 = Ha1::new("939e7578ed9e3c518a452acee763bce9");
        let make = |body: Option<&[u8]>| {
            expected_response(
                Algorithm::default(),
                &ha1,
                HttpMethod::POST,
                "/dir/index.html",
                body,
                "dcd98b7102dd2f0e8b11d0f600bfb0c093",
                "00000001",
                "0a4f113b",
                Qop::AUTH_INT,
            )
        };
        assert_ne!(make(Some(b"some payload")), make(Some(b"other payload")));
        // a missing body hashes like an empty one
        assert_eq!(make(None), make(Some(b"")));
    }

    #[test]
    fn test_generate_nonce_shape() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_challenge_display() {
        let challenge = Challenge {
            realm: "testrealm@host.com".to_string(),
            domain: vec!["/".to_string(), "/login".to_string()],
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".to_string(),
            opaque: Some("5ccc069c403ebaf9f0171e9517f40e41".to_string()),
            stale: false,
            algorithm: Algorithm::default(),
            qop: vec![Qop::AUTH, Qop::AUTH_INT],
        };

        assert_eq!(
            challenge.to_string(),
            r#"Digest realm="testrealm@host.com", domain="/ /login", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41", algorithm=MD5, qop="auth,auth-int""#
        );
    }

    #[test]
    fn test_challenge_display_stale_and_quoting() {
        let challenge = Challenge {
            realm: "weird \" realm".to_string(),
            domain: vec![],
            nonce: "abc".to_string(),
            opaque: None,
            stale: true,
            algorithm: Algorithm::new(AlgorithmType::SHA2_256, true),
            qop: vec![Qop::AUTH],
        };

        assert_eq!(
            challenge.to_string(),
            r#"Digest realm="weird \" realm", nonce="abc", stale=true, algorithm=SHA-256-sess, qop="auth""#
        );
    }

    #[test]
    fn test_ha1_debug_is_redacted() {
        let ha1 = Ha1::new("939e7578ed9e3c518a452acee763bce9");
        assert_eq!(format!("{:?}", ha1), "Ha1(<redacted>)");
    }
}

//endregion
