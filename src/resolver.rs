//! Name resolution over a routing substrate.

use std::num::NonZeroUsize;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error};

use crate::common::{
    DecodeError, Multihash, NameError, Path, PeerId, Record, ValidityError, NAME_PREFIX,
};
use crate::routing::{get_public_key, Routing, RoutingError, RoutingKey, Scope};

/// Cache lifetime assumed for records that carry no explicit TTL.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// How long a resolve call may take before it is abandoned.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(60);

/// How many agreeing copies a record fetch asks the substrate for.
pub const DEFAULT_RESOLVE_QUORUM: NonZeroUsize = match NonZeroUsize::new(16) {
    Some(quorum) => quorum,
    None => unreachable!(),
};

/// How many chained names a resolve call follows before giving up.
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Debug, Clone)]
/// Resolver configurations.
pub struct Config {
    /// Cache lifetime for records without an explicit TTL.
    ///
    /// Defaults to [DEFAULT_CACHE_TTL]
    pub default_ttl: Duration,
    /// Hard bound on chained name hops, guarding against cyclic or
    /// adversarially long chains.
    ///
    /// Defaults to [DEFAULT_MAX_DEPTH]
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_CACHE_TTL,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

#[derive(Debug, Clone)]
/// Per-call resolution options, immutable once constructed.
pub struct ResolveOptions {
    /// Overall deadline for the call, covering every hop.
    ///
    /// `None` means unbounded. Defaults to [DEFAULT_RESOLVE_TIMEOUT].
    pub deadline: Option<Duration>,
    /// Minimum agreeing copies for the record fetch.
    ///
    /// Defaults to [DEFAULT_RESOLVE_QUORUM].
    pub quorum: NonZeroUsize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            deadline: Some(DEFAULT_RESOLVE_TIMEOUT),
            quorum: DEFAULT_RESOLVE_QUORUM,
        }
    }
}

impl ResolveOptions {
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_quorum(mut self, quorum: NonZeroUsize) -> Self {
        self.quorum = quorum;
        self
    }
}

#[derive(thiserror::Error, Debug)]
/// Resolution errors. All are terminal for the call that produced them;
/// retry policy belongs to the caller.
pub enum ResolveError {
    /// The name failed to decode; no substrate call was made.
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    /// The public key prefetch failed, so the substrate could not have
    /// validated a record; no record fetch was attempted.
    #[error("could not retrieve public key: {0}")]
    KeyUnavailable(#[source] RoutingError),

    /// The record fetch failed, timed out, or missed quorum.
    #[error("could not retrieve record: {0}")]
    RecordNotFound(#[source] RoutingError),

    /// The record bytes or its target value were malformed.
    #[error("malformed record: {0}")]
    Decode(#[from] DecodeError),

    /// The record's expiry was present but unparseable under a recognized
    /// validity kind.
    #[error("invalid record validity: {0}")]
    Validity(#[from] ValidityError),

    /// The name chain was longer than [Config::max_depth].
    #[error("name chain exceeded the depth limit of {0}")]
    DepthExceeded(usize),
}

#[derive(Debug, Clone)]
/// Resolves self-certifying names to content paths through a routing
/// substrate.
///
/// Holds no mutable state; concurrent calls are independent.
pub struct Resolver<R> {
    routing: R,
    config: Config,
}

impl<R: Routing> Resolver<R> {
    pub fn new(routing: R) -> Resolver<R> {
        Resolver::with_config(routing, Config::default())
    }

    pub fn with_config(routing: R, config: Config) -> Resolver<R> {
        Resolver { routing, config }
    }

    // === Getters ===

    pub fn routing(&self) -> &R {
        &self.routing
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // === Public Methods ===

    /// Fully resolve a name to a terminal content path with default options.
    pub fn resolve(&self, name: &str) -> Result<(Path, Duration), ResolveError> {
        self.resolve_with_options(name, &ResolveOptions::default())
    }

    /// Fully resolve a name to a terminal content path.
    ///
    /// Returns the path together with how long the caller may cache it:
    /// the minimum effective TTL observed across all hops.
    pub fn resolve_with_options(
        &self,
        name: &str,
        options: &ResolveOptions,
    ) -> Result<(Path, Duration), ResolveError> {
        let scope = Scope::new(options.deadline);

        self.resolve_in_scope(&scope, name, options)
    }

    /// Like [Resolver::resolve_with_options], but bound to a caller-owned
    /// [Scope] whose deadline and cancellation cover the entire chain.
    pub fn resolve_in_scope(
        &self,
        scope: &Scope,
        name: &str,
        options: &ResolveOptions,
    ) -> Result<(Path, Duration), ResolveError> {
        let mut name = name.to_string();
        let mut depth = 0;
        let mut ttl = Duration::MAX;

        loop {
            let (path, hop_ttl) = self.resolve_once(scope, &name, options)?;
            // A chain is only as fresh as its shortest-lived link.
            ttl = ttl.min(hop_ttl);

            if !path.is_name() {
                return Ok((path, ttl));
            }

            depth += 1;
            if depth > self.config.max_depth {
                debug!(?name, depth, "resolution chain too deep");
                return Err(ResolveError::DepthExceeded(self.config.max_depth));
            }

            name = path.as_str().to_string();
        }
    }

    /// Resolve a single hop: the name's record as published, which may point
    /// at another name.
    pub fn resolve_once(
        &self,
        scope: &Scope,
        name: &str,
        options: &ResolveOptions,
    ) -> Result<(Path, Duration), ResolveError> {
        debug!(?name, "resolving name");

        let stripped = name.strip_prefix(NAME_PREFIX).unwrap_or(name);
        let hash = Multihash::from_base58(stripped)?;
        let peer = PeerId::from_multihash(hash)?;

        scope.check().map_err(ResolveError::RecordNotFound)?;

        // The substrate's record validator needs the public key available
        // before the record fetch, or signature validation fails silently.
        if let Err(cause) = get_public_key(&self.routing, scope, &peer) {
            debug!(?name, %cause, "public key prefetch failed");
            return Err(match cause {
                RoutingError::DeadlineExceeded | RoutingError::Cancelled => {
                    ResolveError::RecordNotFound(cause)
                }
                cause => ResolveError::KeyUnavailable(cause),
            });
        }

        let key = RoutingKey::for_record(&peer);
        let value = self
            .routing
            .get_value(scope, &key, options.quorum)
            .map_err(|cause| {
                debug!(?name, %cause, "record lookup failed");
                ResolveError::RecordNotFound(cause)
            })?;

        let record = Record::from_bytes(&value)?;

        let path = match Multihash::from_bytes(record.value()) {
            Ok(hash) => {
                // Old style record carrying a bare content hash.
                debug!(?name, "encountered legacy content-hash record");
                Path::from_multihash(&hash)
            }
            Err(_) => {
                let target = std::str::from_utf8(record.value())
                    .map_err(|_| DecodeError::ValueNotUtf8)?;
                Path::parse(target).map_err(DecodeError::from)?
            }
        };

        let mut ttl = record.ttl().unwrap_or(self.config.default_ttl);

        match record.eol() {
            Ok(None) => {}
            Ok(Some(eol)) => {
                let now = Utc::now();

                if eol <= now {
                    // It *was* valid when we resolved it, but must not be
                    // cached going forward.
                    ttl = Duration::ZERO;
                } else {
                    let remaining = (eol - now).to_std().unwrap_or(Duration::ZERO);
                    if remaining < ttl {
                        ttl = remaining;
                    }
                }
            }
            Err(cause) => {
                error!(?name, %cause, "failed to parse record EOL");
                return Err(ResolveError::Validity(cause));
            }
        }

        Ok((path, ttl))
    }
}
