use serde::Deserialize;

use crate::core::scope::DEFAULT_SCOPE_ALIAS;
use crate::holder::PresentationFormat;

/// Deployment configuration of the presentation pipeline.
///
/// Every field has a default, so an empty document is a valid configuration:
///
/// ```
/// # use dcp_presentation::config::PipelineConfig;
/// let config: PipelineConfig = serde_json::from_str(r#"{ "clock_skew_leeway_secs": 5 }"#).unwrap();
/// assert_eq!(config.scope_alias, "org.eclipse.edc.vc.type");
/// assert_eq!(config.clock_skew_leeway_secs, 5);
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Namespace literal that prefixes every scope string.
    pub scope_alias: String,
    /// Leeway applied by the `nbf` and `exp` validation rules.
    pub clock_skew_leeway_secs: u64,
    /// Lifetime of generated JWT presentations.
    pub presentation_ttl_secs: u64,
    /// Presentation format produced by the
    /// [PresentationService](crate::holder::service::PresentationService).
    pub default_presentation_format: PresentationFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scope_alias: DEFAULT_SCOPE_ALIAS.to_owned(),
            clock_skew_leeway_secs: 0,
            presentation_ttl_secs: 60,
            default_presentation_format: PresentationFormat::JwtVp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overrides_defaults() {
        let config: PipelineConfig = serde_json::from_value(json!({
            "scope_alias": "example.vc.type",
            "default_presentation_format": "enveloped_jose_vp"
        }))
        .unwrap();

        assert_eq!(config.scope_alias, "example.vc.type");
        assert_eq!(config.presentation_ttl_secs, 60);
        assert_eq!(
            config.default_presentation_format,
            PresentationFormat::EnvelopedJoseVp
        );
    }
}
