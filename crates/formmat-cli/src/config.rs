//! JSON configuration of assembly jobs.

use formmat::config::from_json_file;
use formmat::{AppContext, FormCompilerParameters, MatType, OptionsDatabase};
use serde::Deserialize;
use std::path::Path;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct AssemblyConfig {
    pub mesh: MeshConfig,
    #[serde(default)]
    pub space: SpaceConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub bcs: Vec<BcConfig>,
    #[serde(default)]
    pub mat_type: MatType,
    #[serde(default)]
    pub options_prefix: Option<String>,
    #[serde(default)]
    pub form_compiler_parameters: FormCompilerParameters,
    #[serde(default)]
    pub appctx: AppContext,
    /// Prefixed solver options, e.g. `"a_ksp_rtol": "1e-8"`.
    #[serde(default)]
    pub options: OptionsDatabase,
    pub solve: Option<SolveConfig>,
}

/// Interval mesh `[0, length]` split into `cells` equal cells.
#[derive(Debug, Deserialize)]
pub struct MeshConfig {
    pub cells: usize,
    #[serde(default = "default_length")]
    pub length: f64,
}

fn default_length() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
pub struct SpaceConfig {
    #[serde(default = "default_family")]
    pub family: String,
    #[serde(default = "default_degree")]
    pub degree: usize,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            family: default_family(),
            degree: default_degree(),
        }
    }
}

fn default_family() -> String {
    "CG".into()
}

fn default_degree() -> usize {
    1
}

/// `mass * u*v*dx + stiffness * inner(grad(u), grad(v))*dx`
#[derive(Debug, Deserialize)]
pub struct FormConfig {
    #[serde(default = "default_mass")]
    pub mass: f64,
    #[serde(default)]
    pub stiffness: f64,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            mass: default_mass(),
            stiffness: 0.0,
        }
    }
}

fn default_mass() -> f64 {
    1.0
}

/// A Dirichlet condition; without a marker it covers the whole boundary.
#[derive(Debug, Deserialize)]
pub struct BcConfig {
    #[serde(default)]
    pub value: f64,
    pub marker: Option<u32>,
}

/// Right-hand side of an optional solve.
#[derive(Debug, Deserialize)]
pub struct SolveConfig {
    pub rhs: RhsSpec,
}

/// Either one value for every dof or an explicit vector.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RhsSpec {
    Constant(f64),
    Values(Vec<f64>),
}

pub fn load_config(path: impl AsRef<Path>) -> formmat::Result<AssemblyConfig> {
    from_json_file(path)
}
