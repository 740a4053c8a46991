//! Backend layer: the controller adapter, its recovery supervisor and the
//! optional delivery buffer for producer/consumer task pairs.
pub mod adapter;
pub mod delivery;
pub mod recovery;
