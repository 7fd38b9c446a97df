//! Entity synchronization and value coercion core
//!
//! This crate binds validated entity configuration records to live entities,
//! keeps them in sync with the charger's property-push stream and the pull
//! polling path, and implements the per-platform value coercion rules.

mod button;
mod entity;
mod error;
mod number;
mod registry;
mod select;
mod sensor;
mod state;
mod switch;
mod units;
mod update;
mod version;

pub use button::ChargerButton;
pub use entity::{ChargerEntity, EntityBase};
pub use error::{CoercionError, EntityError};
pub use number::ChargerNumber;
pub use registry::{spawn_dispatcher, PushRegistry};
pub use select::ChargerSelect;
pub use sensor::ChargerSensor;
pub use state::{EntityState, EntityStateStore, StateChanged};
pub use switch::ChargerSwitch;
pub use units::{suggested_unit, valid_units};
pub use update::{ChargerUpdate, DUMMY_VERSION};
pub use version::{clean_version, VersionTable};

pub mod setup {
    //! Platform setup entry points, one per platform kind
    pub use crate::button::setup_platform as button;
    pub use crate::number::setup_platform as number;
    pub use crate::select::setup_platform as select;
    pub use crate::sensor::setup_platform as sensor;
    pub use crate::switch::setup_platform as switch;
    pub use crate::update::setup_platform as update;
}
