//! The routing substrate contract the resolver consumes, and its helpers.

mod null;

use std::convert::TryInto;
use std::fmt::{self, Debug, Formatter};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use ed25519_dalek::{VerifyingKey, PUBLIC_KEY_LENGTH};

use crate::common::{PeerId, NAME_PREFIX};

pub use null::Null;

/// Key namespace public keys are stored under.
pub const PUBLIC_KEY_NAMESPACE: &str = "/pk/";

#[derive(thiserror::Error, Debug)]
/// Errors reported by a routing substrate.
pub enum RoutingError {
    #[error("not found")]
    NotFound,

    #[error("operation not supported")]
    NotSupported,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("operation cancelled")]
    Cancelled,

    #[error("public key does not match its peer id")]
    MismatchedKey,

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

#[derive(Clone, PartialEq, Eq, Hash)]
/// A substrate lookup key: a namespace marker followed by raw identity-key
/// bytes.
pub struct RoutingKey(Vec<u8>);

impl RoutingKey {
    /// The key a peer's name record lives under.
    pub fn for_record(peer: &PeerId) -> RoutingKey {
        RoutingKey::in_namespace(NAME_PREFIX, peer)
    }

    /// The key a peer's public key lives under.
    pub fn for_public_key(peer: &PeerId) -> RoutingKey {
        RoutingKey::in_namespace(PUBLIC_KEY_NAMESPACE, peer)
    }

    fn in_namespace(namespace: &str, peer: &PeerId) -> RoutingKey {
        let mut key = Vec::with_capacity(namespace.len() + peer.as_bytes().len());
        key.extend_from_slice(namespace.as_bytes());
        key.extend_from_slice(peer.as_bytes());

        RoutingKey(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for RoutingKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RoutingKey({:x?})", &self.0)
    }
}

#[derive(Debug, Clone, Default)]
/// A deadline-bounded, cancellable scope for substrate calls.
///
/// Clones share the cancellation flag, so cancelling a caller's scope
/// propagates to in-flight calls that poll [Scope::check].
pub struct Scope {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Scope {
    /// A scope with no deadline.
    pub fn unbounded() -> Scope {
        Scope::default()
    }

    /// A scope expiring `timeout` from now; `None` means unbounded.
    pub fn new(timeout: Option<Duration>) -> Scope {
        Scope {
            deadline: timeout.map(|timeout| Instant::now() + timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Scope {
        Scope::new(Some(timeout))
    }

    /// Cancel this scope and everything sharing it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` if unbounded, zero if expired.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Report cancellation or deadline expiry. Substrate implementations
    /// should call this between blocking steps.
    pub fn check(&self) -> Result<(), RoutingError> {
        if self.is_cancelled() {
            return Err(RoutingError::Cancelled);
        }

        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(RoutingError::DeadlineExceeded);
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Addressing information for a peer.
pub struct PeerInfo {
    pub id: PeerId,
    pub addrs: Vec<std::net::SocketAddr>,
}

#[derive(Debug)]
/// A lazy, finite sequence of providers for some content.
///
/// Backends feed it through a channel sender; it terminates once every
/// sender is dropped.
pub struct Providers {
    receiver: Option<flume::Receiver<PeerInfo>>,
}

impl Providers {
    /// An already-exhausted sequence.
    pub fn empty() -> Providers {
        Providers { receiver: None }
    }

    /// A sequence fed by the returned sender.
    pub fn channel() -> (flume::Sender<PeerInfo>, Providers) {
        let (sender, receiver) = flume::unbounded();

        (
            sender,
            Providers {
                receiver: Some(receiver),
            },
        )
    }
}

impl Iterator for Providers {
    type Item = PeerInfo;

    fn next(&mut self) -> Option<PeerInfo> {
        match self.receiver.as_ref()?.recv() {
            Ok(info) => Some(info),
            Err(_) => None,
        }
    }
}

/// The capability contract a routing substrate offers.
///
/// Quorum aggregation, record validation and any retries happen behind this
/// interface; callers treat each operation as atomic.
pub trait Routing: Send + Sync {
    /// Store a value under a key.
    fn put_value(&self, scope: &Scope, key: &RoutingKey, value: &[u8])
        -> Result<(), RoutingError>;

    /// Fetch a value, requiring at least `quorum` agreeing copies.
    fn get_value(
        &self,
        scope: &Scope,
        key: &RoutingKey,
        quorum: NonZeroUsize,
    ) -> Result<Bytes, RoutingError>;

    /// Announce this node as a provider for `peer`'s content.
    fn provide(&self, scope: &Scope, peer: &PeerId, broadcast: bool) -> Result<(), RoutingError>;

    /// Discover up to `limit` providers; the sequence may be empty and
    /// terminates once exhausted.
    fn find_providers(&self, scope: &Scope, peer: &PeerId, limit: usize) -> Providers;

    /// Look up addressing information for a peer.
    fn find_peer(&self, scope: &Scope, peer: &PeerId) -> Result<PeerInfo, RoutingError>;
}

impl<R: Routing + ?Sized> Routing for &R {
    fn put_value(
        &self,
        scope: &Scope,
        key: &RoutingKey,
        value: &[u8],
    ) -> Result<(), RoutingError> {
        (**self).put_value(scope, key, value)
    }

    fn get_value(
        &self,
        scope: &Scope,
        key: &RoutingKey,
        quorum: NonZeroUsize,
    ) -> Result<Bytes, RoutingError> {
        (**self).get_value(scope, key, quorum)
    }

    fn provide(&self, scope: &Scope, peer: &PeerId, broadcast: bool) -> Result<(), RoutingError> {
        (**self).provide(scope, peer, broadcast)
    }

    fn find_providers(&self, scope: &Scope, peer: &PeerId, limit: usize) -> Providers {
        (**self).find_providers(scope, peer, limit)
    }

    fn find_peer(&self, scope: &Scope, peer: &PeerId) -> Result<PeerInfo, RoutingError> {
        (**self).find_peer(scope, peer)
    }
}

impl<R: Routing + ?Sized> Routing for Arc<R> {
    fn put_value(
        &self,
        scope: &Scope,
        key: &RoutingKey,
        value: &[u8],
    ) -> Result<(), RoutingError> {
        (**self).put_value(scope, key, value)
    }

    fn get_value(
        &self,
        scope: &Scope,
        key: &RoutingKey,
        quorum: NonZeroUsize,
    ) -> Result<Bytes, RoutingError> {
        (**self).get_value(scope, key, quorum)
    }

    fn provide(&self, scope: &Scope, peer: &PeerId, broadcast: bool) -> Result<(), RoutingError> {
        (**self).provide(scope, peer, broadcast)
    }

    fn find_providers(&self, scope: &Scope, peer: &PeerId, limit: usize) -> Providers {
        (**self).find_providers(scope, peer, limit)
    }

    fn find_peer(&self, scope: &Scope, peer: &PeerId) -> Result<PeerInfo, RoutingError> {
        (**self).find_peer(scope, peer)
    }
}

/// Make a peer's public key available ahead of a record fetch.
///
/// Identity peer ids carry their key inline; anything else is a quorum-1
/// read of the `/pk/` namespace, checked against the peer id's digest.
pub fn get_public_key<R: Routing + ?Sized>(
    routing: &R,
    scope: &Scope,
    peer: &PeerId,
) -> Result<VerifyingKey, RoutingError> {
    if let Some(key) = peer.inline_public_key() {
        return Ok(key);
    }

    let bytes = routing.get_value(scope, &RoutingKey::for_public_key(peer), NonZeroUsize::MIN)?;

    let raw: [u8; PUBLIC_KEY_LENGTH] = bytes
        .as_ref()
        .try_into()
        .map_err(|_| RoutingError::MismatchedKey)?;
    let key = VerifyingKey::from_bytes(&raw).map_err(|_| RoutingError::MismatchedKey)?;

    if !peer.matches_public_key(&key) {
        return Err(RoutingError::MismatchedKey);
    }

    Ok(key)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scope_deadline() {
        let scope = Scope::unbounded();
        assert!(scope.check().is_ok());
        assert_eq!(scope.remaining(), None);

        let scope = Scope::with_timeout(Duration::ZERO);
        assert!(matches!(
            scope.check(),
            Err(RoutingError::DeadlineExceeded)
        ));
        assert_eq!(scope.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn cancellation_propagates_to_clones() {
        let scope = Scope::unbounded();
        let clone = scope.clone();

        scope.cancel();

        assert!(matches!(clone.check(), Err(RoutingError::Cancelled)));
    }

    #[test]
    fn routing_keys_are_namespaced() {
        let peer = PeerId::random();

        let record = RoutingKey::for_record(&peer);
        let public_key = RoutingKey::for_public_key(&peer);

        assert!(record.as_bytes().starts_with(b"/name/"));
        assert!(public_key.as_bytes().starts_with(b"/pk/"));
        assert!(record.as_bytes().ends_with(peer.as_bytes()));
        assert_ne!(record, public_key);
    }

    #[test]
    fn providers_channel_terminates() {
        let (sender, providers) = Providers::channel();

        sender.send(PeerInfo {
            id: PeerId::random(),
            addrs: vec![],
        })
        .unwrap();
        drop(sender);

        assert_eq!(providers.count(), 1);
    }

    #[test]
    fn inline_key_needs_no_substrate() {
        let signer = ed25519_dalek::SigningKey::from_bytes(&[1; 32]);
        let peer = PeerId::from_inline_public_key(&signer.verifying_key());

        let key = get_public_key(&Null, &Scope::unbounded(), &peer).unwrap();

        assert_eq!(key, signer.verifying_key());
    }
}
