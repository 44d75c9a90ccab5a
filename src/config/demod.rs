use crate::params::DemodParams;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct DemodToolConfig {
    #[serde(rename = "input")]
    pub input: PathBuf,
    /// Optional raw quality map image; gradient magnitude is used otherwise.
    #[serde(default)]
    pub quality_image: Option<PathBuf>,
    #[serde(default)]
    pub params: DemodParams,
    pub output: DemodOutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct DemodOutputConfig {
    /// Wrapped phase, stretched to 8-bit.
    pub phase_image: PathBuf,
    #[serde(default)]
    pub fx_image: Option<PathBuf>,
    #[serde(default)]
    pub fy_image: Option<PathBuf>,
    /// Demodulated mask; differs from all-white only with a scan threshold.
    #[serde(default)]
    pub mask_image: Option<PathBuf>,
    pub report_json: PathBuf,
}

pub fn load_config(path: &Path) -> Result<DemodToolConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    parse_config(&data).map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}

fn parse_config(data: &str) -> Result<DemodToolConfig, serde_json::Error> {
    serde_json::from_str(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{SeedSelection, StrategyKind};

    #[test]
    fn minimal_config_uses_default_params() {
        let cfg = parse_config(
            r#"{
                "input": "fringes.png",
                "output": { "phase_image": "out/phase.png", "report_json": "out/report.json" }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.input, PathBuf::from("fringes.png"));
        assert_eq!(cfg.params, DemodParams::default());
        assert!(cfg.quality_image.is_none());
        assert!(cfg.output.fx_image.is_none());
    }

    #[test]
    fn params_section_is_forwarded() {
        let cfg = parse_config(
            r#"{
                "input": "fringes.png",
                "params": {
                    "strategy": "tracker",
                    "seed": { "mode": "tuned_response", "wx": 0.5, "wy": 0.0 }
                },
                "output": {
                    "phase_image": "p.png",
                    "fx_image": "fx.png",
                    "report_json": "r.json"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.params.strategy, StrategyKind::Tracker);
        assert_eq!(
            cfg.params.seed,
            SeedSelection::TunedResponse { wx: 0.5, wy: 0.0 }
        );
        assert_eq!(cfg.output.fx_image, Some(PathBuf::from("fx.png")));
    }

    #[test]
    fn missing_output_section_is_an_error() {
        assert!(parse_config(r#"{ "input": "a.png" }"#).is_err());
    }

    #[test]
    fn unreadable_file_reports_the_path() {
        let err = load_config(Path::new("/nonexistent/demod.json")).unwrap_err();
        assert!(err.contains("/nonexistent/demod.json"), "{err}");
    }
}
