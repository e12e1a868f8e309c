//! Lifecycle engine services

pub mod batch;
pub mod identifier;
pub mod lifecycle;
pub mod roll;
pub mod shipment;
pub mod stock;
pub mod traceability;

pub use batch::BatchService;
pub use identifier::IdentifierService;
pub use lifecycle::RollLifecycleService;
pub use roll::RollService;
pub use shipment::ShipmentService;
pub use stock::StockService;
pub use traceability::TraceabilityService;
