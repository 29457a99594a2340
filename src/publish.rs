//! Publishing signed name records to the routing substrate.

use std::time::Duration;

use chrono::Utc;
use ed25519_dalek::SigningKey;
use tracing::debug;

use crate::common::{DecodeError, Path, PeerId, Record};
use crate::routing::{Routing, RoutingError, RoutingKey, Scope};

/// How long a published record stays valid.
pub const DEFAULT_RECORD_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(thiserror::Error, Debug)]
/// Publishing errors.
pub enum PublishError {
    #[error("failed to encode record: {0}")]
    Encode(#[from] DecodeError),

    #[error("record lifetime is out of range")]
    Lifetime,

    #[error("failed to store record: {0}")]
    Routing(#[from] RoutingError),
}

#[derive(Debug, Clone)]
/// Publishes signed name records for a signing key's name.
///
/// Stores the public key under `/pk/` first, so resolvers with hashed peer
/// ids can prefetch it, then the record under the name's key.
pub struct Publisher<R> {
    routing: R,
    lifetime: Duration,
    record_ttl: Option<Duration>,
}

impl<R: Routing> Publisher<R> {
    pub fn new(routing: R) -> Publisher<R> {
        Publisher {
            routing,
            lifetime: DEFAULT_RECORD_LIFETIME,
            record_ttl: None,
        }
    }

    // === Options ===

    /// How long published records stay valid before their EOL.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Explicit cache TTL to stamp on published records.
    pub fn with_record_ttl(mut self, ttl: Duration) -> Self {
        self.record_ttl = Some(ttl);
        self
    }

    // === Public Methods ===

    /// Publish `path` as the target of `signer`'s name, with a caller-managed
    /// monotonic sequence number.
    pub fn publish(
        &self,
        scope: &Scope,
        signer: &SigningKey,
        path: &Path,
        sequence: u64,
    ) -> Result<(), PublishError> {
        let public_key = signer.verifying_key();
        let peer = PeerId::from_public_key(&public_key);

        let lifetime =
            chrono::Duration::from_std(self.lifetime).map_err(|_| PublishError::Lifetime)?;
        let eol = Utc::now() + lifetime;

        let record = Record::new(
            signer,
            path.as_str().as_bytes(),
            sequence,
            eol,
            self.record_ttl,
        );
        let value = record.to_bytes()?;

        debug!(%peer, sequence, "publishing name record");

        self.routing
            .put_value(scope, &RoutingKey::for_public_key(&peer), public_key.as_bytes())?;
        self.routing
            .put_value(scope, &RoutingKey::for_record(&peer), &value)?;

        Ok(())
    }
}
