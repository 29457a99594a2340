#![doc = include_str!("../README.md")]

// Public modules
mod common;

pub mod publish;
pub mod resolver;
pub mod routing;

pub use crate::common::{
    DecodeError, Multihash, NameError, Path, PathError, PeerId, Record, ValidityError,
    ValidityKind, CONTENT_PREFIX, NAME_PREFIX,
};
pub use crate::publish::{PublishError, Publisher};
pub use crate::resolver::{Config, ResolveError, ResolveOptions, Resolver};
pub use crate::routing::{
    get_public_key, Null, PeerInfo, Providers, Routing, RoutingError, RoutingKey, Scope,
};
pub use bytes::Bytes;

pub use ed25519_dalek::{SigningKey, VerifyingKey};
