//! Domain models for the booking system.

mod appointment;
mod doctor;
mod slot;

pub use appointment::*;
pub use doctor::*;
pub use slot::*;
