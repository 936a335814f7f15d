pub mod booking;
pub mod directory;
pub mod lifecycle;
pub mod policy;
pub mod registry;
pub mod transition;
