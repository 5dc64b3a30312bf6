//! Core engine for inferring and evolving columnar warehouse schemas.
//!
//! This crate provides the foundational pieces for `lakeschema`:
//!
//! - A conservative, promotion-ordered type inference engine that
//!   classifies sampled tokens into canonical types (`inference` module).
//! - A format-agnostic canonical field/table/schema model that supports
//!   arbitrary nesting (`canonical` module).
//! - A naming normalizer that maps raw identifiers to warehouse-safe
//!   ones and records rename lineage (`naming` module).
//! - A projector from canonical fields to warehouse column definitions
//!   (`mapping` module).
//! - A structural diff engine that classifies schema drift into breaking
//!   and non-breaking changes (`diff` module).
//! - A file-backed, versioned schema registry keyed by entity with
//!   structural hashing (`registry` module).
//! - A drift policy enforcer that decides whether a drifted schema is
//!   registered, folded into the current version, or rejected
//!   (`policy` module).
//!
//! Higher-level integration crates (for example, a CLI or an ingestion
//! service) are expected to depend on this core crate rather than
//! re-implementing the inference and governance logic.
#![deny(missing_docs)]
pub mod adapter;
pub mod canonical;
pub mod diff;
pub mod inference;
pub mod mapping;
pub mod naming;
pub mod pipeline;
pub mod policy;
pub mod registry;
pub mod storage;
