//! Data dictionary passed to the sampling engine

use serde::{Deserialize, Serialize};

use crate::Result;

/// Step counts in the data dictionary: an array for the partial-credit family,
/// a scalar for the rating-scale family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepCounts {
    /// `m[i]` per item.
    PerItem(Vec<u32>),
    /// Shared `m`.
    Shared(u32),
}

/// Canonical data dictionary.
///
/// Field names serialize exactly as the model artifacts declare them:
/// `I, J, N, ii, jj, y, K, W`, plus `m` and `pos` for step-structured variants.
/// `W` is row-major (`J` rows of `K` values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanData {
    /// Number of items.
    #[serde(rename = "I")]
    pub n_items: usize,
    /// Number of persons.
    #[serde(rename = "J")]
    pub n_persons: usize,
    /// Number of observations.
    #[serde(rename = "N")]
    pub n_obs: usize,
    /// 1-based item index per observation.
    pub ii: Vec<usize>,
    /// 1-based person index per observation.
    pub jj: Vec<usize>,
    /// Response per observation.
    pub y: Vec<u32>,
    /// Number of design columns.
    #[serde(rename = "K")]
    pub n_covariates: usize,
    /// Person design matrix.
    #[serde(rename = "W")]
    pub design: Vec<Vec<f64>>,
    /// Step counts (step-structured variants only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<StepCounts>,
    /// 1-based β offsets (partial-credit family only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Vec<usize>>,
}

impl StanData {
    /// Serialize to the engine's JSON data format.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON data file body.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny(m: Option<StepCounts>, pos: Option<Vec<usize>>) -> StanData {
        StanData {
            n_items: 2,
            n_persons: 1,
            n_obs: 2,
            ii: vec![1, 2],
            jj: vec![1, 1],
            y: vec![0, 2],
            n_covariates: 1,
            design: vec![vec![1.0]],
            m,
            pos,
        }
    }

    #[test]
    fn test_field_names_match_artifact_schema() {
        let json = tiny(None, None).to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        let obj = v.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["I", "J", "K", "N", "W", "ii", "jj", "y"]);
        assert_eq!(v["W"], serde_json::json!([[1.0]]));
    }

    #[test]
    fn test_step_fields_serialize_by_family() {
        let pcm = tiny(Some(StepCounts::PerItem(vec![0, 2])), Some(vec![1, 1]));
        let v: serde_json::Value = serde_json::from_str(&pcm.to_json().unwrap()).unwrap();
        assert_eq!(v["m"], serde_json::json!([0, 2]));
        assert_eq!(v["pos"], serde_json::json!([1, 1]));

        let rsm = tiny(Some(StepCounts::Shared(2)), None);
        let v: serde_json::Value = serde_json::from_str(&rsm.to_json().unwrap()).unwrap();
        assert_eq!(v["m"], serde_json::json!(2));
        assert!(v.get("pos").is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let data = tiny(Some(StepCounts::Shared(2)), None);
        let back = StanData::from_json(&data.to_json().unwrap()).unwrap();
        assert_eq!(back, data);
    }
}
