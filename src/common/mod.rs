// Shared foundation: tuning constants, math value types, slot arena.

pub mod arena;
pub mod math;
pub mod settings;
