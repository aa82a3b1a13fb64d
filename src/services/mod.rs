//! Store seams: where passes come from and where artifacts go.
//!
//! Concrete adapters live in [`crate::infra`].

pub mod document_store;
pub mod pass_store;
