//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate the task and category stores into task-centric operations.
//! - Keep presentation/controller layers decoupled from storage details.

mod name_lock;
pub mod todo_model;
