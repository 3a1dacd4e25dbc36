//! # agentgate-registry
//!
//! An in-memory stand-in for the on-chain app registry.
//!
//! The registry is seeded from a TOML fixture describing agent wallets,
//! delegations and published app versions, and implements
//! [`agentgate_core::traits::ChainRegistry`]. Version switches and
//! revocations can be applied at runtime to exercise the resolver.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use agentgate_registry::engine::InMemoryRegistry;
//!
//! let registry = InMemoryRegistry::from_file(Path::new("fixtures/registry.toml"))?;
//! registry.set_version_enabled(AppId(1), AppVersion(3), false)?;
//! ```

pub mod engine;
pub mod fixture;
