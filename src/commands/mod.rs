// Declarative commands
pub mod declarative;

// Core commands
pub mod doctor;
pub mod hash;
