//! Config entry lifecycle for the Wattpilot charger integration
//!
//! One [`ConfigEntry`] describes one charger. [`setup_entry`] builds the
//! per-entry [`RuntimeData`] (entities, push dispatcher, pull poller) from
//! the bundled platform definitions; [`unload_entry`] tears it down again
//! and [`apply_options`] reloads the entry with updated options.

mod diagnostics;
mod entry;
mod lifecycle;
mod runtime;

pub use diagnostics::entry_diagnostics;
pub use entry::{ConfigEntry, EntryParams};
pub use lifecycle::{apply_options, setup_entry, unload_entry, SetupError};
pub use runtime::RuntimeData;
