//! Cremalink device SDK surface
//!
//! Everything the Home Assistant integration needs from the device layer:
//! the blocking [`Device`] handle, the status and raw property snapshots it
//! returns, the [`DeviceFactory`] that builds handles for local and cloud
//! connections, and the beverage catalog used for naming.
//!
//! Wire protocols live behind these traits. [`SimulatedDevice`] is an
//! in-memory machine for running the host without hardware.

mod beverages;
mod device;
mod properties;
mod simulated;

pub use beverages::{BeverageCatalog, BeverageCategory, BeverageInfo};
pub use device::{
    BrewParameters, Device, DeviceError, DeviceFactory, LocalDeviceParams, MonitorSnapshot,
    STATUS_STANDBY,
};
pub use properties::{keys, RawProperties};
pub use simulated::{SimulatedDevice, SimulatedFactory};
