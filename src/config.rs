use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

pub const CONFIG_ENV: &str = "GRADEBOOKD_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcConfig {
    /// Count a task without a score as zero points instead of leaving it out.
    pub treat_missing_as_zero: bool,
    /// Allowed distance of a weight table's total from 100.
    pub weight_tolerance: f64,
    /// Round report averages to one decimal.
    pub roff: bool,
    /// With `treat_missing_as_zero`, tasks due after this date stay excluded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
}

impl Default for CalcConfig {
    fn default() -> Self {
        Self {
            treat_missing_as_zero: false,
            weight_tolerance: 0.01,
            roff: false,
            as_of: None,
        }
    }
}

/// Partial config as sent by a caller; unset keys fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CalcConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treat_missing_as_zero: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_tolerance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roff: Option<bool>,
    /// `Some(None)` is an explicit `null` and clears the date set below.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub as_of: Option<Option<NaiveDate>>,
}

/// Keeps a present `null` apart from a missing key; `default` covers the latter.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl CalcConfigPatch {
    pub fn from_json(raw: Option<&serde_json::Value>) -> Result<Self, String> {
        let Some(raw) = raw else {
            return Ok(Self::default());
        };
        if raw.is_null() {
            return Ok(Self::default());
        }
        let patch: CalcConfigPatch =
            serde_json::from_value(raw.clone()).map_err(|e| format!("invalid config: {}", e))?;
        patch.validate()?;
        Ok(patch)
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(t) = self.weight_tolerance {
            if !t.is_finite() || !(0.0..=100.0).contains(&t) {
                return Err("weightTolerance must be a number in 0..=100".to_string());
            }
        }
        Ok(())
    }

    /// Layer `other` on top of `self`.
    pub fn merged(&self, other: &CalcConfigPatch) -> CalcConfigPatch {
        CalcConfigPatch {
            treat_missing_as_zero: other.treat_missing_as_zero.or(self.treat_missing_as_zero),
            weight_tolerance: other.weight_tolerance.or(self.weight_tolerance),
            roff: other.roff.or(self.roff),
            as_of: other.as_of.or(self.as_of),
        }
    }
}

impl CalcConfig {
    pub fn apply(&self, patch: &CalcConfigPatch) -> CalcConfig {
        CalcConfig {
            treat_missing_as_zero: patch
                .treat_missing_as_zero
                .unwrap_or(self.treat_missing_as_zero),
            weight_tolerance: patch.weight_tolerance.unwrap_or(self.weight_tolerance),
            roff: patch.roff.unwrap_or(self.roff),
            as_of: match patch.as_of {
                Some(v) => v,
                None => self.as_of,
            },
        }
    }

    /// Defaults overlaid with the file at `path`.
    pub fn load_file(path: &Path) -> anyhow::Result<CalcConfig> {
        let text = std::fs::read_to_string(path)?;
        let raw: serde_json::Value = serde_json::from_str(&text)?;
        let patch = CalcConfigPatch::from_json(Some(&raw)).map_err(anyhow::Error::msg)?;
        Ok(CalcConfig::default().apply(&patch))
    }

    /// Startup config: defaults, then the `GRADEBOOKD_CONFIG` file when set.
    /// A file that cannot be read or parsed is logged and skipped.
    pub fn from_env() -> CalcConfig {
        let Ok(path) = std::env::var(CONFIG_ENV) else {
            return CalcConfig::default();
        };
        match CalcConfig::load_file(Path::new(&path)) {
            Ok(cfg) => {
                tracing::info!(path = %path, "loaded calc config");
                cfg
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "ignoring unreadable calc config");
                CalcConfig::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_layers_fall_through() {
        let base = CalcConfig::default();
        let session = CalcConfigPatch {
            treat_missing_as_zero: Some(true),
            weight_tolerance: Some(0.5),
            ..Default::default()
        };
        let request = CalcConfigPatch {
            weight_tolerance: Some(1.0),
            ..Default::default()
        };
        let cfg = base.apply(&session.merged(&request));
        assert!(cfg.treat_missing_as_zero);
        assert_eq!(cfg.weight_tolerance, 1.0);
        assert!(!cfg.roff);
    }

    #[test]
    fn patch_rejects_bad_tolerance_and_unknown_keys() {
        let bad = json!({ "weightTolerance": -1.0 });
        assert!(CalcConfigPatch::from_json(Some(&bad)).is_err());
        let unknown = json!({ "missingAsZero": true });
        assert!(CalcConfigPatch::from_json(Some(&unknown)).is_err());
        let empty = CalcConfigPatch::from_json(None).expect("empty patch");
        assert_eq!(empty, CalcConfigPatch::default());
    }

    #[test]
    fn explicit_null_as_of_clears_lower_layer() {
        let session =
            CalcConfigPatch::from_json(Some(&json!({ "asOf": "2026-10-01" }))).expect("session");
        let request = CalcConfigPatch::from_json(Some(&json!({ "asOf": null }))).expect("request");
        let absent = CalcConfigPatch::from_json(Some(&json!({ "roff": true }))).expect("absent");
        assert_eq!(request.as_of, Some(None));
        assert_eq!(absent.as_of, None);

        let base = CalcConfig::default();
        assert_eq!(base.apply(&session.merged(&request)).as_of, None);
        assert_eq!(
            base.apply(&session.merged(&absent)).as_of,
            NaiveDate::from_ymd_opt(2026, 10, 1)
        );

        let file = CalcConfig {
            as_of: NaiveDate::from_ymd_opt(2026, 9, 1),
            ..CalcConfig::default()
        };
        assert_eq!(file.apply(&request).as_of, None);
        assert_eq!(
            serde_json::to_value(&request).expect("patch json"),
            json!({ "asOf": null })
        );
    }

    #[test]
    fn load_file_overlays_defaults() {
        let p = std::env::temp_dir().join(format!(
            "gradebookd-cfg-{}.json",
            std::process::id()
        ));
        std::fs::write(&p, r#"{ "roff": true, "asOf": "2026-10-01" }"#).expect("write cfg");
        let cfg = CalcConfig::load_file(&p).expect("load cfg");
        assert!(cfg.roff);
        assert_eq!(cfg.as_of.map(|d| d.to_string()).as_deref(), Some("2026-10-01"));
        assert_eq!(cfg.weight_tolerance, 0.01);
        let _ = std::fs::remove_file(p);
    }
}
