use crate::cache::{NonceCache, UserData};
use crate::clock::{Clock, SystemClock};
use crate::digest::{expected_response, generate_nonce, Challenge, DigestContext, Ha1};
use crate::{Algorithm, Error, HttpMethod, Qop, Result, Settings};
use log::{debug, trace};
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Looks up the stored credential hash for a username.
///
/// Injected into the checker so the credential back-end (database, config
/// file, test double) stays out of the validation core. May block; it is
/// called at most once per validation, before any cache access.
pub trait CredentialResolver: Send + Sync {
    /// `Ok(None)` means the user is unknown; validation fails closed.
    /// `Err` means the back-end could not answer and is propagated as such,
    /// never downgraded to a rejection.
    fn resolve(&self, username: &str) -> Result<Option<Ha1>>;
}

/// Outcome of validating one authentication attempt.
///
/// These are results, not errors: a forged digest and a replayed counter
/// are expected traffic for an auth endpoint.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Verdict {
    /// Credentials and nonce check out; serve the request.
    Ok,
    /// Unknown user, unknown or expired nonce, or a response digest that
    /// does not match. Answer 401 with a fresh challenge.
    WrongUserData,
    /// The request counter did not advance; a replay. Answer 401 without
    /// handing the sender a usable fresh nonce.
    DuplicateRequest,
}

/// Digest checker that issues and tracks its own nonces in process memory.
///
/// Nonce state does not survive a restart; clients holding nonces from a
/// previous incarnation are re-challenged. All methods take `&self` and are
/// safe to call from many threads at once.
pub struct StandaloneChecker {
    settings: Settings,
    realm: String,
    resolver: Box<dyn CredentialResolver>,
    cache: NonceCache,
    clock: Arc<dyn Clock>,
}

impl StandaloneChecker {
    /// `ways` and `way_size` bound the nonce cache at `ways * way_size`
    /// tracked nonces, evicting least-recently-used per shard beyond that.
    pub fn new(
        settings: Settings,
        realm: impl Into<String>,
        resolver: Box<dyn CredentialResolver>,
        ways: NonZeroUsize,
        way_size: NonZeroUsize,
    ) -> Self {
        Self::with_clock(settings, realm, resolver, ways, way_size, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new) with an explicit time source, so tests can
    /// cross TTL boundaries without sleeping.
    pub fn with_clock(
        settings: Settings,
        realm: impl Into<String>,
        resolver: Box<dyn CredentialResolver>,
        ways: NonZeroUsize,
        way_size: NonZeroUsize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = NonceCache::new(ways, way_size, settings.nonce_ttl(), clock.clone());
        StandaloneChecker {
            settings,
            realm: realm.into(),
            resolver,
            cache,
            clock,
        }
    }

    /// Classify one authentication attempt.
    ///
    /// `method` and, for auth-int, `body` come from the request being
    /// authenticated; the context alone does not carry them.
    ///
    /// # Errors
    /// A non-hex `nc`, an unparseable `algorithm`/`qop` directive, or a
    /// failing credential back-end surface as `Err` so the transport can
    /// answer 400/500 instead of 401. Everything else is a [`Verdict`].
    pub fn validate(
        &self,
        ctx: &DigestContext,
        method: HttpMethod<'_>,
        body: Option<&[u8]>,
    ) -> Result<Verdict> {
        let ha1 = match self.resolver.resolve(&ctx.username)? {
            Some(ha1) => ha1,
            None => {
                debug!("digest auth: unknown user {:?}", ctx.username);
                return Ok(Verdict::WrongUserData);
            }
        };

        let nc = u64::from_str_radix(&ctx.nc, 16)
            .map_err(|_| Error::InvalidNonceCount(ctx.nc.clone()))?;

        let algorithm = match ctx.algorithm.as_deref() {
            Some(name) => Algorithm::from_str(name)?,
            None => Algorithm::default(),
        };
        let qop = Qop::from_str(&ctx.qop)?;

        if ctx.realm != self.realm
            || algorithm != self.settings.algorithm()
            || !self.settings.qops().contains(&qop)
        {
            debug!(
                "digest auth: directive mismatch (realm={:?}, algorithm={}, qop={})",
                ctx.realm, algorithm, qop
            );
            return Ok(Verdict::WrongUserData);
        }

        // Pure hashing; kept outside the shard lock so only the counter
        // comparison and update serialize per nonce.
        let expected = expected_response(
            algorithm,
            &ha1,
            method,
            &ctx.uri,
            body,
            &ctx.nonce,
            &ctx.nc,
            &ctx.cnonce,
            qop,
        );

        let verdict = self.cache.mutate(&ctx.nonce, |entry| {
            let data = match entry {
                // never issued, evicted, or past its TTL
                None => return Verdict::WrongUserData,
                Some(data) => data,
            };

            if nc <= data.nonce_count {
                return Verdict::DuplicateRequest;
            }

            if !bool::from(expected.as_bytes().ct_eq(ctx.response.as_bytes())) {
                return Verdict::WrongUserData;
            }

            data.nonce_count = nc;
            data.ha1 = Some(ha1);
            Verdict::Ok
        });

        trace!("digest auth: {:?} for nonce {:?}", verdict, ctx.nonce);
        Ok(verdict)
    }

    /// Register a nonce this server just handed out, with no counter
    /// history, so the client's first use of it validates.
    pub fn push_known_nonce(&self, nonce: &str) {
        let data = UserData::new(None, nonce, self.clock.now(), 0);
        self.cache.put(nonce, data);
    }

    /// Mint a fresh nonce, register it, and return the challenge to send.
    ///
    /// Pass `stale = true` when re-challenging a request that failed only
    /// because its nonce aged out.
    pub fn issue_challenge(&self, stale: bool) -> Challenge {
        let nonce = generate_nonce();
        self.push_known_nonce(&nonce);
        trace!("digest auth: issued nonce {:?}", nonce);

        Challenge {
            realm: self.realm.clone(),
            domain: self.settings.domains().to_vec(),
            nonce,
            opaque: None,
            stale,
            algorithm: self.settings.algorithm(),
            qop: self.settings.qops().to_vec(),
        }
    }

    /// Header the challenge belongs in, honoring proxy mode.
    pub fn challenge_header_name(&self) -> &'static str {
        if self.settings.is_proxy() {
            "Proxy-Authenticate"
        } else {
            "WWW-Authenticate"
        }
    }

    /// Tracked nonces per cache shard, for capacity monitoring.
    pub fn resident_counts(&self) -> Vec<usize> {
        self.cache.resident_counts()
    }
}
