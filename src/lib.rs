//! This crate implements the server side of Digest Auth as specified by IETF
//! RFCs 2069, 2617, and 7616: it verifies the `Authorization` headers that
//! clients send back, in a "standalone" mode where the server itself issues
//! and tracks nonces in process memory instead of delegating nonce storage
//! to an external service.
//!
//! The tracked nonces live in a sharded, capacity-bounded, time-expiring
//! cache; per-nonce request counters must strictly increase, which is what
//! defeats replayed requests. Nonce state does not survive a restart; after
//! one, clients are simply re-challenged.
//!
//! # Examples
//!
//! Basic usage:
//!
//! ```
//! use digest_auth_server::{
//!     CredentialResolver, Ha1, HttpMethod, Settings, StandaloneChecker, Verdict,
//! };
//! use std::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! // Resolves a username to its stored H(username:realm:password). In
//! // production this would consult your user store; it never sees plain
//! // passwords.
//! struct SingleUser;
//!
//! impl CredentialResolver for SingleUser {
//!     fn resolve(&self, _username: &str) -> digest_auth_server::Result<Option<Ha1>> {
//!         Ok(Some(Ha1::new("939e7578ed9e3c518a452acee763bce9")))
//!     }
//! }
//!
//! let settings = Settings::new(
//!     "MD5",
//!     &["/"],
//!     &["auth"],
//!     false,
//!     false,
//!     Duration::from_secs(30),
//! )
//! .unwrap();
//!
//! let checker = StandaloneChecker::new(
//!     settings,
//!     "testrealm@host.com",
//!     Box::new(SingleUser),
//!     NonZeroUsize::new(4).unwrap(),
//!     NonZeroUsize::new(25000).unwrap(),
//! );
//!
//! // Normally `checker.issue_challenge(false)` mints and registers a fresh
//! // nonce for the WWW-Authenticate header; here we register the known
//! // RFC 2617 example nonce instead so the numbers below line up.
//! checker.push_known_nonce("dcd98b7102dd2f0e8b11d0f600bfb0c093");
//!
//! // Value of the Authorization header the client sent (RFC 2617 §3.5).
//! let ctx = digest_auth_server::parse(
//!     r#"Digest username="Mufasa",
//!        realm="testrealm@host.com",
//!        nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093",
//!        uri="/dir/index.html",
//!        qop=auth,
//!        nc=00000001,
//!        cnonce="0a4f113b",
//!        response="6629fae49393a05397450978507c4ef1",
//!        opaque="5ccc069c403ebaf9f0171e9517f40e41""#,
//! )
//! .unwrap();
//!
//! assert_eq!(
//!     checker.validate(&ctx, HttpMethod::GET, None).unwrap(),
//!     Verdict::Ok
//! );
//!
//! // Replaying the exact same request is caught by the nonce counter.
//! assert_eq!(
//!     checker.validate(&ctx, HttpMethod::GET, None).unwrap(),
//!     Verdict::DuplicateRequest
//! );
//! ```

mod cache;
mod checker;
mod clock;
mod digest;
mod enums;
mod error;
mod settings;

pub use error::{Error, Result};

pub use crate::cache::{NonceCache, UserData};
pub use crate::checker::{CredentialResolver, StandaloneChecker, Verdict};
pub use crate::clock::{Clock, MockClock, SystemClock};
pub use crate::digest::{Challenge, DigestContext, Ha1};
pub use crate::enums::{Algorithm, AlgorithmType, HttpMethod, Qop};
pub use crate::settings::Settings;

/// Parse an `Authorization` header value into a [`DigestContext`].
/// It's just a convenience method to call [`DigestContext::parse()`](struct.DigestContext.html#method.parse).
pub fn parse(authorization: &str) -> Result<DigestContext> {
    DigestContext::parse(authorization)
}

#[test]
fn test_parse_validate() {
    use std::num::NonZeroUsize;
    use std::time::Duration;

    struct SingleUser;

    impl CredentialResolver for SingleUser {
        fn resolve(&self, _username: &str) -> Result<Option<Ha1>> {
            Ok(Some(Ha1::new("939e7578ed9e3c518a452acee763bce9")))
        }
    }

    let settings = Settings::new(
        "MD5",
        &["/"],
        &["auth"],
        false,
        false,
        Duration::from_secs(30),
    )
    .unwrap();

    let checker = StandaloneChecker::new(
        settings,
        "testrealm@host.com",
        Box::new(SingleUser),
        NonZeroUsize::new(4).unwrap(),
        NonZeroUsize::new(25000).unwrap(),
    );

    let challenge = checker.issue_challenge(false);
    let header = challenge.to_string();
    assert!(header.starts_with("Digest realm=\"testrealm@host.com\""));

    // a well-behaved client answers the challenge we just rendered
    let algorithm = Algorithm::default();
    let ha2 = algorithm.hash_str("GET:/dir/index.html");
    let response = algorithm.hash_str(&format!(
        "939e7578ed9e3c518a452acee763bce9:{}:00000001:0a4f113b:auth:{}",
        challenge.nonce, ha2
    ));

    let ctx = crate::parse(&format!(
        r#"Digest username="Mufasa", realm="testrealm@host.com", nonce="{}", uri="/dir/index.html", qop=auth, nc=00000001, cnonce="0a4f113b", response="{}""#,
        challenge.nonce, response
    ))
    .unwrap();

    assert_eq!(
        checker.validate(&ctx, HttpMethod::GET, None).unwrap(),
        Verdict::Ok
    );
}
