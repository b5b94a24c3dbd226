//! Card Resolver - tiered resolution and enrichment for trading-card catalogs
//!
//! Resolves card and set ids through an in-process cache, a persistent store
//! and the price tracker catalog, enriches records with TCG API imagery and
//! watches the metered catalog's credit quota.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod enrich;
pub mod error;
pub mod memo;
pub mod models;
pub mod persist;
pub mod pricing;
pub mod quota;
pub mod reconcile;
pub mod retry;
pub mod service;
pub mod store;
pub mod web;

pub use config::Config;
pub use error::{Error, ResolverError, Result};
pub use models::{EntityKind, EntityRecord};
pub use service::{Collaborators, ResolutionService, ResolveResponse};
