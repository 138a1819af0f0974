//! Application layer orchestrating the credit lifecycle.
//!
//! `CreditEngine` is the entry point. It wires the components below
//! around a shared [`Ledger`](crate::domain::ports::Ledger), a per-entity
//! lock table and a timer queue for simulated gateway callbacks.

pub mod admission;
pub mod deadline;
pub mod decision;
pub mod engine;
pub mod loans;
pub mod locks;
pub mod notifications;
pub mod scheduler;
pub mod settlement;

pub use deadline::Deadline;
pub use engine::{CreditEngine, SettlementPump, spawn_settlement_pump};
pub use notifications::Notification;
pub use settlement::Ack;
