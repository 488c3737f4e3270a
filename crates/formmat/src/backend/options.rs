//! Matrix types and prefix-scoped option lookup.
//!
//! Every backend object may carry an options prefix. Options are looked up
//! as `<prefix><name>` in an `OptionsDatabase`, so two matrices with
//! different prefixes can be configured independently from one source.

use super::traits::{BackendError, BackendResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Storage scheme of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatType {
    /// Compressed sparse row storage
    Aij,
    /// Block compressed sparse row storage
    Baij,
    /// Block-structured storage, one sub-matrix per (test, trial) block
    Nest,
    /// No storage; the operator is applied through a callback
    #[serde(rename = "matfree")]
    MatFree,
}

impl Default for MatType {
    fn default() -> Self {
        MatType::Aij
    }
}

impl MatType {
    /// Canonical string identifier.
    pub fn name(&self) -> &'static str {
        match self {
            MatType::Aij => "aij",
            MatType::Baij => "baij",
            MatType::Nest => "nest",
            MatType::MatFree => "matfree",
        }
    }

    pub fn is_matrix_free(&self) -> bool {
        matches!(self, MatType::MatFree)
    }
}

impl fmt::Display for MatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MatType {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aij" | "seqaij" | "mpiaij" => Ok(MatType::Aij),
            "baij" | "seqbaij" | "mpibaij" => Ok(MatType::Baij),
            "nest" => Ok(MatType::Nest),
            "matfree" | "python" | "shell" => Ok(MatType::MatFree),
            _ => Err(BackendError::UnknownMatType(s.to_string())),
        }
    }
}

/// Flat key/value option store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionsDatabase {
    entries: BTreeMap<String, String>,
}

impl OptionsDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Raw value of `<prefix><name>`.
    pub fn get(&self, prefix: Option<&str>, name: &str) -> Option<&str> {
        let key = format!("{}{}", prefix.unwrap_or(""), name);
        self.entries.get(&key).map(String::as_str)
    }

    /// Parsed value of `<prefix><name>`; `Ok(None)` when unset.
    pub fn get_parsed<T: FromStr>(&self, prefix: Option<&str>, name: &str) -> BackendResult<Option<T>> {
        match self.get(prefix, name) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| BackendError::InvalidOption {
                option: format!("{}{}", prefix.unwrap_or(""), name),
                value: raw.to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
