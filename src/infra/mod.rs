//! Concrete pass-store and document-store adapters.

pub mod csv_passes;
pub mod firestore;
pub mod memory;
