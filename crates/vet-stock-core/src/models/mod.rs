//! Domain models for the vet-stock engine.

mod item;
mod movement;

pub use item::*;
pub use movement::*;
