use std::fmt;

use glam::{DVec2, DVec3};

use crate::rng::SeededRandom;

// ---------------------------------------------------------------------------
// Schema — the fixed, ordered list of shader parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Vec2,
    Vec3,
}

impl Shape {
    pub fn components(self) -> usize {
        match self {
            Shape::Scalar => 1,
            Shape::Vec2 => 2,
            Shape::Vec3 => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Shape::Scalar => "scalar",
            Shape::Vec2 => "2-vector",
            Shape::Vec3 => "3-vector",
        }
    }
}

/// How each component of a parameter is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Draw {
    /// `uniform01`, half-open `[0, 1)`.
    Unit,
    /// `uniform_range(lo, hi)`.
    Range(f64, f64),
}

impl Draw {
    pub fn sample(self, rng: &mut SeededRandom) -> f64 {
        match self {
            Draw::Unit => rng.uniform01(),
            Draw::Range(lo, hi) => rng.uniform_range(lo, hi),
        }
    }

    pub fn bounds(self) -> (f64, f64) {
        match self {
            Draw::Unit => (0.0, 1.0),
            Draw::Range(lo, hi) => (lo, hi),
        }
    }

    pub fn contains(self, v: f64) -> bool {
        let (lo, hi) = self.bounds();
        (lo..=hi).contains(&v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub shape: Shape,
    pub draw: Draw,
}

const fn spec(name: &'static str, shape: Shape, draw: Draw) -> ParamSpec {
    ParamSpec { name, shape, draw }
}

/// Draw order is part of the reproducibility contract: a recorded seed only
/// reproduces an image if every entry consumes the stream in this order.
pub const PARAMETER_SCHEMA: [ParamSpec; 15] = [
    spec("numOctaves", Shape::Scalar, Draw::Range(8.0, 16.0)),
    spec("zoom", Shape::Scalar, Draw::Range(0.4, 1.6)),
    spec("cc", Shape::Vec3, Draw::Range(10.0, 20.0)),
    spec("dd", Shape::Vec3, Draw::Unit),
    spec("q_h", Shape::Vec2, Draw::Range(0.7, 1.3)),
    spec("r_h", Shape::Vec2, Draw::Range(0.7, 1.3)),
    spec("pattern_h", Shape::Scalar, Draw::Range(0.8, 1.2)),
    spec("center_point", Shape::Vec2, Draw::Unit),
    spec("pixel_distance_choice", Shape::Scalar, Draw::Unit),
    spec("interpolation_choice", Shape::Scalar, Draw::Range(0.0, 3.0)),
    spec("q_fbm_displace_1", Shape::Vec2, Draw::Range(0.0, 20.0)),
    spec("q_fbm_displace_2", Shape::Vec2, Draw::Range(0.0, 20.0)),
    spec("r_fbm_displace_1", Shape::Vec2, Draw::Range(0.0, 20.0)),
    spec("r_fbm_displace_2", Shape::Vec2, Draw::Range(0.0, 20.0)),
    spec("color_speed", Shape::Scalar, Draw::Range(0.5, 1.0)),
];

/// Prefix shared by every parameter's uniform name in the shader.
pub const UNIFORM_PREFIX: &str = "u_";

/// Name of the uniform carrying the viewport size in pixels.
pub const RESOLUTION_UNIFORM: &str = "u_resolution";

pub fn uniform_name(param: &str) -> String {
    format!("{UNIFORM_PREFIX}{param}")
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Scalar(f64),
    Vec2(DVec2),
    Vec3(DVec3),
}

impl ParamValue {
    pub fn shape(&self) -> Shape {
        match self {
            ParamValue::Scalar(_) => Shape::Scalar,
            ParamValue::Vec2(_) => Shape::Vec2,
            ParamValue::Vec3(_) => Shape::Vec3,
        }
    }

    pub fn components(&self) -> Vec<f64> {
        match *self {
            ParamValue::Scalar(x) => vec![x],
            ParamValue::Vec2(v) => v.to_array().to_vec(),
            ParamValue::Vec3(v) => v.to_array().to_vec(),
        }
    }

    /// Narrowed to the precision shaders consume.
    pub fn to_f32s(&self) -> Vec<f32> {
        self.components().into_iter().map(|c| c as f32).collect()
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Scalar(x) => write!(f, "{x:.6}"),
            ParamValue::Vec2(v) => write!(f, "({:.6}, {:.6})", v.x, v.y),
            ParamValue::Vec3(v) => write!(f, "({:.6}, {:.6}, {:.6})", v.x, v.y, v.z),
        }
    }
}

// ---------------------------------------------------------------------------
// ParameterSet
// ---------------------------------------------------------------------------

/// One complete set of shader parameters, in schema order.
///
/// Only [`ParameterGenerator`] builds these, so every schema entry is present
/// exactly once and lies within its declared range.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(&'static str, ParamValue)>,
}

impl ParameterSet {
    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, ParamValue)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            writeln!(f, "{name} = {value}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ParameterGenerator
// ---------------------------------------------------------------------------

pub struct ParameterGenerator;

impl ParameterGenerator {
    /// Walk the schema in order, drawing every component of an entry before
    /// moving on to the next one.
    pub fn generate(rng: &mut SeededRandom) -> ParameterSet {
        let entries = PARAMETER_SCHEMA
            .iter()
            .map(|spec| {
                let mut draw = || spec.draw.sample(rng);
                let value = match spec.shape {
                    Shape::Scalar => ParamValue::Scalar(draw()),
                    Shape::Vec2 => {
                        let x = draw();
                        let y = draw();
                        ParamValue::Vec2(DVec2::new(x, y))
                    }
                    Shape::Vec3 => {
                        let x = draw();
                        let y = draw();
                        let z = draw();
                        ParamValue::Vec3(DVec3::new(x, y, z))
                    }
                };
                debug_assert!(
                    value.components().iter().all(|&c| spec.draw.contains(c)),
                    "{} drawn outside {:?}",
                    spec.name,
                    spec.draw.bounds()
                );
                (spec.name, value)
            })
            .collect();

        let set = ParameterSet { entries };
        log::debug!("Parameters for seed {}:\n{set}", rng.seed());
        set
    }
}
