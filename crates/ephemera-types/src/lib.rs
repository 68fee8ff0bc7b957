//! Foundation types for Ephemera.
//!
//! Ephemera keeps short-lived binary objects (generated PDFs and the like)
//! for a fixed retention window. This crate holds the small value types every
//! other Ephemera crate shares.
//!
//! # Key Types
//!
//! - [`ObjectId`] — Random, unguessable identifier; doubles as the access capability
//! - [`IdSpec`] — Width of generated identifiers, used to generate and strictly parse them
//! - [`DisplayName`] — Sanitized, purely cosmetic filename shown to clients
//! - [`NamePolicy`] — Extension and length rules applied during sanitization
//! - [`RetrievalRef`] — Client-facing reference built from an id and a display name

pub mod error;
pub mod id;
pub mod name;
pub mod reference;

pub use error::TypeError;
pub use id::{IdSpec, ObjectId};
pub use name::{DisplayName, NamePolicy};
pub use reference::RetrievalRef;
