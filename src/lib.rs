//! Intersection Simulation Library
//!
//! A single-intersection traffic micro-simulation with an adaptive traffic
//! light. It is driven frame by frame by an external shell (a GUI or the
//! bundled headless runner) that only calls `tick` and reads state back.

pub mod simulation;
