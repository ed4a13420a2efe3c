//! # CoralSurf Parallel
//!
//! Execution strategies for independent units of work (one per year).
//!
//! With the `parallel` feature, work runs on Rayon; without it every mode
//! degrades to sequential execution and results are identical.

pub mod strategy;

pub use strategy::{num_cpus, ParallelStrategy, ProcessingMode};
