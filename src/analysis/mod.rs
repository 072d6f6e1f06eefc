//! Analysis options for the constraint and material passes

use serde::{Deserialize, Serialize};

use crate::error::FEAResult;

/// Controls for the local return-mapping solve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnMappingOptions {
    /// Residual tolerance as a multiple of the initial yield stress
    pub tolerance_factor: f64,
    /// Local Newton iteration cap
    pub max_iterations: usize,
    /// Consistency parameter is scaled by `1 - relaxation` after the solve
    pub relaxation: f64,
}

impl Default for ReturnMappingOptions {
    fn default() -> Self {
        Self {
            tolerance_factor: 1e-8,
            max_iterations: 25,
            relaxation: 1e-8,
        }
    }
}

/// Options for a constraint/material pass over the domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Run independent work units on the rayon pool
    pub parallel: bool,
    /// Below this many work units the pass runs serially
    pub min_parallel_items: usize,
    /// Redistribute inertial reactions as well (not supported)
    pub include_inertia: bool,
    /// Local solver settings applied to every point of a batch update;
    /// `None` leaves each point's own settings in place
    #[serde(default)]
    pub return_mapping: Option<ReturnMappingOptions>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            min_parallel_items: 64,
            include_inertia: false,
            return_mapping: None,
        }
    }
}

impl AnalysisOptions {
    /// Default options, parallel where worthwhile
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that keep every pass on the calling thread
    pub fn serial() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Override the local solver settings of every updated point
    pub fn with_return_mapping(mut self, options: ReturnMappingOptions) -> Self {
        self.return_mapping = Some(options);
        self
    }

    /// Override the return mapping iteration cap, other settings at defaults
    /// unless already overridden
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        let mut options = self.return_mapping.unwrap_or_default();
        options.max_iterations = max_iterations;
        self.return_mapping = Some(options);
        self
    }

    /// Whether a pass over `n` items should go parallel
    pub fn use_parallel(&self, n: usize) -> bool {
        self.parallel && n >= self.min_parallel_items
    }

    /// Parse options from JSON
    pub fn from_json(json: &str) -> FEAResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize options to JSON
    pub fn to_json(&self) -> FEAResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_constants() {
        let opts = AnalysisOptions::default();
        assert!(opts.return_mapping.is_none());
        assert!(!opts.include_inertia);
        let local = ReturnMappingOptions::default();
        assert_eq!(local.max_iterations, 25);
        assert_eq!(local.tolerance_factor, 1e-8);
        assert_eq!(local.relaxation, 1e-8);
    }

    #[test]
    fn test_json_round_trip() {
        let opts = AnalysisOptions::serial().with_max_iterations(40);
        let json = opts.to_json().unwrap();
        let back = AnalysisOptions::from_json(&json).unwrap();
        assert!(!back.parallel);
        assert_eq!(back.return_mapping.map(|r| r.max_iterations), Some(40));
    }

    #[test]
    fn test_max_iterations_keeps_other_overrides() {
        let local = ReturnMappingOptions {
            relaxation: 0.0,
            ..ReturnMappingOptions::default()
        };
        let opts = AnalysisOptions::serial()
            .with_return_mapping(local)
            .with_max_iterations(3);
        let applied = opts.return_mapping.unwrap();
        assert_eq!(applied.max_iterations, 3);
        assert_eq!(applied.relaxation, 0.0);
    }

    #[test]
    fn test_return_mapping_optional_in_json() {
        let opts =
            AnalysisOptions::from_json(r#"{"parallel":false,"min_parallel_items":8,"include_inertia":false}"#)
                .unwrap();
        assert!(opts.return_mapping.is_none());
    }

    #[test]
    fn test_parallel_threshold() {
        let opts = AnalysisOptions::default();
        assert!(!opts.use_parallel(10));
        assert!(opts.use_parallel(1000));
        assert!(!AnalysisOptions::serial().use_parallel(1000));
    }
}
