//! Domain model: entities, value objects, state graphs and the ports the
//! engine depends on. Nothing in here performs I/O.

pub mod application;
pub mod ids;
pub mod installment;
pub mod lifecycle;
pub mod loan;
pub mod money;
pub mod obligation;
pub mod payment;
pub mod ports;
pub mod schedule;
