//! Seeded parameter generation for the marble shader.
//!
//! Nothing in this crate touches the GPU: a [`Seed`] feeds a [`SeededRandom`],
//! which [`ParameterGenerator`] turns into the [`ParameterSet`] bound as
//! uniforms by `marble-gpu`.

pub mod params;
pub mod rng;

pub use params::{
    uniform_name, Draw, ParamSpec, ParamValue, ParameterGenerator, ParameterSet, Shape,
    PARAMETER_SCHEMA, RESOLUTION_UNIFORM, UNIFORM_PREFIX,
};
pub use rng::{Seed, SeededRandom};
