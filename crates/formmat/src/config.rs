//! Configuration shared by the assemblers and the matrix-free context.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Application context forwarded opaquely to matrix-free operators.
pub type AppContext = BTreeMap<String, serde_json::Value>;

/// Parameters steering local kernel generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormCompilerParameters {
    /// Quadrature degree; `None` picks the degree integrating the
    /// integrand exactly.
    pub quadrature_degree: Option<usize>,
}

impl FormCompilerParameters {
    pub fn with_quadrature_degree(degree: usize) -> Self {
        Self {
            quadrature_degree: Some(degree),
        }
    }
}

/// Parse a JSON document into a configuration type.
pub fn from_json_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}

/// Read and parse a JSON configuration file.
pub fn from_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    from_json_str(&text)
}
