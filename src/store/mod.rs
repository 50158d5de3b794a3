pub mod shipments;
pub mod tracking;
