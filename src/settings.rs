use crate::{Algorithm, Error, Qop, Result};
use std::str::FromStr;
use std::time::Duration;

/// Server-side digest policy, shared read-only by every validation.
///
/// Validated once here; the checker never re-validates per request. Fields
/// are private so a value that exists is known to be well-formed.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    algorithm: Algorithm,
    domains: Vec<String>,
    qops: Vec<Qop>,
    is_proxy: bool,
    is_session: bool,
    nonce_ttl: Duration,
}

impl Settings {
    /// Build and validate a policy.
    ///
    /// `algorithm` is the RFC name ("MD5", "SHA-256", ...). A `-sess` suffix
    /// and the `is_session` flag are equivalent; either turns on the session
    /// variant.
    ///
    /// # Errors
    /// Unknown algorithm or qop names, or an empty `domains`/`qops` list.
    pub fn new(
        algorithm: &str,
        domains: &[&str],
        qops: &[&str],
        is_proxy: bool,
        is_session: bool,
        nonce_ttl: Duration,
    ) -> Result<Self> {
        let parsed = Algorithm::from_str(algorithm)?;

        if domains.is_empty() {
            return Err(Error::EmptyDomains);
        }
        if qops.is_empty() {
            return Err(Error::EmptyQops);
        }

        let mut parsed_qops = Vec::with_capacity(qops.len());
        for qop in qops {
            parsed_qops.push(Qop::from_str(qop)?);
        }

        Ok(Settings {
            algorithm: Algorithm::new(parsed.algo, parsed.sess || is_session),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            qops: parsed_qops,
            is_proxy,
            is_session: parsed.sess || is_session,
            nonce_ttl,
        })
    }

    /// Algorithm clients must use, session flag included.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// URIs covered by challenges issued with this policy.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Qop options offered and accepted.
    pub fn qops(&self) -> &[Qop] {
        &self.qops
    }

    pub fn is_proxy(&self) -> bool {
        self.is_proxy
    }

    pub fn is_session(&self) -> bool {
        self.is_session
    }

    /// How long an issued nonce stays valid.
    pub fn nonce_ttl(&self) -> Duration {
        self.nonce_ttl
    }
}
