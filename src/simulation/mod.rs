// src/simulation/mod.rs
//! Rigid-body simulation
//!
//! Binds rapier bodies to named transform nodes and copies the simulated
//! poses back into the scene graph after every tick.

pub mod physics_node;
pub mod simulation;

// Re-export main types
pub use physics_node::{CollisionShape, PhysicsNode};
pub use simulation::{BoxExtents, PhysicsError, Simulation, SOLVER_ITERATIONS, TICK};
