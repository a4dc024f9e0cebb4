//! Engine parameters with safe defaults and domain validation.
//!
//! Every scoring and allocation constant lives here so that a guild can tune
//! its economy from a parameter file without touching the algorithms.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameter validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    /// A single value is outside its domain.
    Domain(String),
    /// Two values contradict each other.
    Consistency(String),
}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamsError::Domain(m) => write!(f, "domain error: {m}"),
            ParamsError::Consistency(m) => write!(f, "consistency error: {m}"),
        }
    }
}

impl std::error::Error for ParamsError {}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct EngineParams {
    /// Highest tag number the engine will hand out or accept.
    pub max_tag: u32,
    /// Points for beating one opponent.
    pub base_win_points: u64,
    /// Extra points for an adjacent-tier upset (Silver>Gold, Bronze>Silver).
    pub standard_upset_bonus: u64,
    /// Extra points for a two-tier upset (Bronze>Gold).
    pub giant_slayer_bonus: u64,
    /// Winners with fewer rounds than this never earn a bonus.
    pub min_rounds_for_bonus: u32,
    /// Top percentile (rounded up) classified Gold.
    pub gold_band_pct: u8,
    /// Cumulative percentile (rounded up) classified Silver.
    pub silver_band_pct: u8,
    /// Swap intents older than this are discarded. `None` keeps them forever.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub intent_ttl_secs: Option<u64>,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            max_tag: 1000,
            base_win_points: 100,
            standard_upset_bonus: 50,
            giant_slayer_bonus: 100,
            min_rounds_for_bonus: 3,
            gold_band_pct: 10,
            silver_band_pct: 40,
            intent_ttl_secs: None,
        }
    }
}

impl EngineParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.max_tag == 0 {
            return Err(ParamsError::Domain("max_tag must be > 0".into()));
        }
        if self.base_win_points == 0 {
            return Err(ParamsError::Domain("base_win_points must be > 0".into()));
        }
        if self.gold_band_pct == 0 || self.gold_band_pct > 100 {
            return Err(ParamsError::Domain(format!(
                "gold_band_pct must be in 1..=100, got {}",
                self.gold_band_pct
            )));
        }
        if self.silver_band_pct > 100 {
            return Err(ParamsError::Domain(format!(
                "silver_band_pct must be <= 100, got {}",
                self.silver_band_pct
            )));
        }
        if self.silver_band_pct < self.gold_band_pct {
            return Err(ParamsError::Consistency(format!(
                "silver_band_pct ({}) below gold_band_pct ({})",
                self.silver_band_pct, self.gold_band_pct
            )));
        }
        if self.intent_ttl_secs == Some(0) {
            return Err(ParamsError::Domain("intent_ttl_secs must be > 0 when set".into()));
        }
        Ok(())
    }

    /// True iff `n` is a usable tag number under this configuration.
    #[inline]
    pub fn tag_in_range(&self, n: u32) -> bool {
        n > 0 && n <= self.max_tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert_eq!(EngineParams::default().validate(), Ok(()));
    }

    #[test]
    fn band_consistency() {
        let p = EngineParams { gold_band_pct: 50, silver_band_pct: 40, ..Default::default() };
        assert!(matches!(p.validate(), Err(ParamsError::Consistency(_))));
        let p = EngineParams { gold_band_pct: 0, ..Default::default() };
        assert!(matches!(p.validate(), Err(ParamsError::Domain(_))));
        let p = EngineParams { intent_ttl_secs: Some(0), ..Default::default() };
        assert!(p.validate().is_err());
    }

    #[test]
    fn tag_range() {
        let p = EngineParams { max_tag: 10, ..Default::default() };
        assert!(p.tag_in_range(1));
        assert!(p.tag_in_range(10));
        assert!(!p.tag_in_range(0));
        assert!(!p.tag_in_range(11));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_fills_defaults() {
        let p: EngineParams = serde_json::from_str(r#"{"max_tag": 72}"#).unwrap();
        assert_eq!(p.max_tag, 72);
        assert_eq!(p.base_win_points, 100);
        assert!(serde_json::from_str::<EngineParams>(r#"{"bogus": 1}"#).is_err());
    }
}
