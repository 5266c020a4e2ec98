pub mod actions;
pub mod ask;
pub mod doctor;
pub mod gateway;
pub mod onboard;
