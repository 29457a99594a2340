//! An inert routing backend: never stores, never finds.

use std::num::NonZeroUsize;

use bytes::Bytes;

use super::{PeerInfo, Providers, Routing, RoutingError, RoutingKey, Scope};
use crate::common::PeerId;

#[derive(Debug, Clone, Copy, Default)]
/// A reference [Routing] backend with fixed behavior: writes and
/// announcements are unsupported, lookups find nothing, and discovery is
/// always exhausted. Performs no network activity; useful as a conformance
/// baseline and a safe default.
pub struct Null;

impl Routing for Null {
    fn put_value(
        &self,
        _scope: &Scope,
        _key: &RoutingKey,
        _value: &[u8],
    ) -> Result<(), RoutingError> {
        Err(RoutingError::NotSupported)
    }

    fn get_value(
        &self,
        _scope: &Scope,
        _key: &RoutingKey,
        _quorum: NonZeroUsize,
    ) -> Result<Bytes, RoutingError> {
        Err(RoutingError::NotFound)
    }

    fn provide(
        &self,
        _scope: &Scope,
        _peer: &PeerId,
        _broadcast: bool,
    ) -> Result<(), RoutingError> {
        Err(RoutingError::NotSupported)
    }

    fn find_providers(&self, _scope: &Scope, _peer: &PeerId, _limit: usize) -> Providers {
        Providers::empty()
    }

    fn find_peer(&self, _scope: &Scope, _peer: &PeerId) -> Result<PeerInfo, RoutingError> {
        Err(RoutingError::NotFound)
    }
}
