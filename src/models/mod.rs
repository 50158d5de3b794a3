pub mod carrier;
pub mod order;
pub mod shipment;
pub mod tracking;
