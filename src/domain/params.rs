//! Ordered parameter sets.

use std::ops::Index;

use crate::domain::RealVar;
use crate::error::{FitError, Result};

/// Parameters of one PDF, in insertion order.
///
/// Keys are local to the PDF (`"mean"`), while the stored variables carry
/// qualified names (`"gauss_mean"`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    entries: Vec<(String, RealVar)>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, var: RealVar) -> Result<()> {
        let key = key.into();
        if self.entries.iter().any(|(k, _)| *k == key) {
            return Err(FitError::InvalidModel(format!("parameter '{key}' defined twice")));
        }
        self.entries.push((key, var));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&RealVar> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn vars(&self) -> impl Iterator<Item = &RealVar> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn vars_mut(&mut self) -> impl Iterator<Item = &mut RealVar> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Index<&str> for ParamSet {
    type Output = RealVar;

    /// # Panics
    /// Panics if no parameter is stored under `key`.
    fn index(&self, key: &str) -> &RealVar {
        match self.get(key) {
            Some(var) => var,
            None => panic!("no parameter '{key}'"),
        }
    }
}
