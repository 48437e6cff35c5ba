//! # spd-io: casefile ingestion for the SPD dispatch engine
//!
//! Everything between bytes-on-disk and the flat [`spd_core::DispatchCase`]:
//!
//! - [`document`]: a thin wrapper over the nested casefile tree with
//!   dotted-path lookup, singleton/list normalization and typed attribute
//!   reads. The tree keeps the `@`-prefixed attribute names of the source
//!   XML bit-exact.
//! - [`lookup`]: typed accessors for every entity collection the engine
//!   reads (traders, interconnectors, regions, generic constraints, the
//!   reference solution mirror).
//! - [`extract`]: builds the flat data model and resolves effective
//!   (what-if) initial conditions and ramp rates.
//! - [`patch`]: applies `{path, value}` updates to a casefile before a
//!   solve.
//! - [`importers`]: XML→document conversion, ZIP archive entries, JSON
//!   files, and a directory-backed [`importers::CasefileStore`].

pub mod document;
pub mod extract;
pub mod importers;
pub mod lookup;
pub mod patch;

pub use document::CaseDocument;
pub use extract::extract_case;
pub use importers::CasefileStore;
pub use patch::{patch_casefile, PatchOperation};
