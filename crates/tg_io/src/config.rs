//! Engine parameter files.
//!
//! A parameter file is a JSON object with any subset of the `EngineParams`
//! fields. Missing fields take their defaults, unknown fields are rejected,
//! and the result must pass `EngineParams::validate`.

use std::fs;
use std::path::Path;

use tg_core::EngineParams;

use crate::IoError;

/// Hard cap on parameter file size.
const MAX_PARAMS_BYTES: u64 = 64 * 1024;

pub fn load_params(path: &Path) -> Result<EngineParams, IoError> {
    let meta = fs::metadata(path)?;
    if meta.len() > MAX_PARAMS_BYTES {
        return Err(IoError::Invalid(format!(
            "{}: parameter file larger than {MAX_PARAMS_BYTES} bytes",
            path.display()
        )));
    }
    let text = fs::read_to_string(path)?;
    parse_params(&text)
}

/// Parse and validate parameters from JSON text.
pub fn parse_params(text: &str) -> Result<EngineParams, IoError> {
    let params: EngineParams = serde_json::from_str(text)?;
    params.validate()?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn missing_fields_take_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"max_tag": 72, "intent_ttl_secs": 3600}}"#).unwrap();
        let p = load_params(f.path()).unwrap();
        assert_json_eq!(
            serde_json::to_value(&p).unwrap(),
            json!({
                "max_tag": 72,
                "base_win_points": 100,
                "standard_upset_bonus": 50,
                "giant_slayer_bonus": 100,
                "min_rounds_for_bonus": 3,
                "gold_band_pct": 10,
                "silver_band_pct": 40,
                "intent_ttl_secs": 3600
            })
        );
    }

    #[test]
    fn unknown_fields_are_json_errors() {
        assert!(matches!(parse_params(r#"{"maxTag": 5}"#), Err(IoError::Json { .. })));
    }

    #[test]
    fn domain_violations_are_invalid() {
        let err = parse_params(r#"{"gold_band_pct": 60, "silver_band_pct": 40}"#).unwrap_err();
        assert!(matches!(err, IoError::Invalid(_)), "{err}");
    }

    #[test]
    fn missing_file_is_a_path_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_params(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, IoError::Path(_)));
    }
}
