//! nano VM: runs target units the way the block runtime does.
//!
//! All units share one namespace of cells and lists. Each unit starts with
//! one original instance; scripts run as cooperative threads that yield at
//! the end of every non-atomic loop iteration and on `wait`, `ask` and
//! `broadcast_and_wait`. The VM exists to check emitted code end to end,
//! so it is deterministic: a fixed tick clock, a seeded `random` and
//! scripted answers for `ask`.

mod code;
pub mod vm;

pub use vm::{Limits, ThreadId, Vm, TICK_SECONDS};
