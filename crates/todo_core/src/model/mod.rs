//! Record and domain model types.
//!
//! # Responsibility
//! - Define the schemaless `Record` shape shared by every store backend.
//! - Define typed task/category projections used by the model service.
//!
//! # Invariants
//! - Every record is identified by a store-assigned `RecordId` that is never
//!   reused.
//! - Typed projections are derived from records, never stored separately.

pub mod record;
pub mod task;
