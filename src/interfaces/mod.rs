//! Outer surfaces: the CSV scenario reader, the report writer and the runner
//! that replays scenarios against the engine.

pub mod csv;
pub mod scenario;
