//! Domain models for the Mill Roll Tracking Platform

mod batch;
mod fabric;
mod order;
mod payload;
mod roll;
mod scan;
mod shipment;
mod wastage;

pub use batch::*;
pub use fabric::*;
pub use order::*;
pub use payload::*;
pub use roll::*;
pub use scan::*;
pub use shipment::*;
pub use wastage::*;
