//! Engine module housing time sources and the session worker.
//!
//! `clock` and `interval` are the leaf timing primitives every periodic
//! source is built on; `handle` runs a `SessionMachine` on its own thread
//! and exposes it through a command channel and a snapshot broadcast.

pub mod clock;
pub mod handle;
pub mod interval;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use handle::{SessionCommand, SessionHandle};
pub use interval::{MissedTicks, PeriodicTask};
