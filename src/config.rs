//! Deployment configuration for the state normalizer.
//!
//! State lookup tables are static per deployment and ship as a toml file: one record
//! per (category, type) pair mapping raw data-source status strings to the canonical
//! vocabulary. Anything not configured falls back to the built-in defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{
    fs::{read_to_string, write},
    path::PathBuf,
};

use crate::{
    error::VigilError,
    properties::EntityCategory,
    state::{StateNormalizer, StateTable},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTableRecord {
    pub category: EntityCategory,
    #[serde(rename = "type")]
    pub vertex_type: String,
    pub states: StateTable,
}

/// Toml-file-backed provider for normalizer tables.
#[derive(Debug, Serialize, Deserialize)]
pub struct StateConfig {
    path: PathBuf,
}

impl StateConfig {
    pub fn new(path: PathBuf) -> Self {
        StateConfig { path }
    }

    pub fn get_tables(&self) -> Result<Vec<StateTableRecord>, VigilError> {
        tracing::debug!("Attempting to read state tables from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, returning empty table list.");
            return Ok(Vec::new());
        }
        let content = read_to_string(&self.path)?;
        let config: BTreeMap<String, Vec<StateTableRecord>> = toml::from_str(&content)?;
        config
            .get("tables")
            .cloned()
            .ok_or_else(|| VigilError::NotFound("tables not found in config".to_string()))
    }

    pub fn set_tables(&self, tables: Vec<StateTableRecord>) -> Result<(), VigilError> {
        tracing::debug!("Attempting to write state tables to: {:?}", &self.path);
        let mut config = BTreeMap::new();
        config.insert("tables".to_string(), tables);
        let toml_string = toml::to_string(&config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }

    /// The built-in defaults overlaid with whatever this config file provides.
    pub fn load_normalizer(&self) -> Result<StateNormalizer, VigilError> {
        let mut normalizer = StateNormalizer::with_defaults();
        if self.path.exists() {
            for record in self.get_tables()? {
                normalizer.insert_table(record.category, &record.vertex_type, record.states);
            }
        }
        Ok(normalizer)
    }
}
