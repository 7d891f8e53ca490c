//! Core module defining the building blocks of a compartmented process over a network.
//!
//! - [`compartment`]: The disease states a node can be in
//! - [`network`]: The network the process runs over
//! - [`loci`]: The dynamic sets of elements where events can happen
//! - [`process`]: The compartments, seeding and event rules of SIR, SIS, SEIR or custom processes
pub mod compartment;
pub mod loci;
pub mod network;
pub mod process;

/// The maximum number of loci a process can register (one bit per locus and element).
pub const MAX_LOCI: usize = 64;
