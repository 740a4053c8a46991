//! Abstraction traits consumed by the backend (peripheral driver and timer).
pub mod twai_driver;
pub mod twai_timer;
