//! Discovery configuration and the base score table.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{HunterError, HunterResult, ScoreTier, SourceKind};

/// Base score per confidence tier plus the corroboration bonus.
///
/// Immutable for the duration of a run; concurrent runs may each carry
/// their own table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreTable {
    pub swagger: f64,
    pub common_path_ok: f64,
    pub javascript: f64,
    pub common_path_protected: f64,
    pub html_link_api: f64,
    pub form_action: f64,
    pub sitemap: f64,
    pub meta_tag: f64,
    pub robots: f64,
    pub comment: f64,
    pub html_link_generic: f64,
    /// Added once per additional distinct source kind on the same endpoint.
    pub corroboration_bonus: f64,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            swagger: 1.0,
            common_path_ok: 0.85,
            javascript: 0.80,
            common_path_protected: 0.6,
            html_link_api: 0.70,
            form_action: 0.65,
            sitemap: 0.55,
            meta_tag: 0.50,
            robots: 0.45,
            comment: 0.40,
            html_link_generic: 0.35,
            corroboration_bonus: 0.05,
        }
    }
}

impl ScoreTable {
    pub fn base_score(&self, tier: ScoreTier) -> f64 {
        match tier {
            ScoreTier::Swagger => self.swagger,
            ScoreTier::CommonPathOk => self.common_path_ok,
            ScoreTier::Javascript => self.javascript,
            ScoreTier::CommonPathProtected => self.common_path_protected,
            ScoreTier::HtmlLinkApi => self.html_link_api,
            ScoreTier::FormAction => self.form_action,
            ScoreTier::Sitemap => self.sitemap,
            ScoreTier::MetaTag => self.meta_tag,
            ScoreTier::Robots => self.robots,
            ScoreTier::Comment => self.comment,
            ScoreTier::HtmlLinkGeneric => self.html_link_generic,
        }
    }

    fn validate(&self) -> HunterResult<()> {
        let scores = [
            ("swagger", self.swagger),
            ("common_path_ok", self.common_path_ok),
            ("javascript", self.javascript),
            ("common_path_protected", self.common_path_protected),
            ("html_link_api", self.html_link_api),
            ("form_action", self.form_action),
            ("sitemap", self.sitemap),
            ("meta_tag", self.meta_tag),
            ("robots", self.robots),
            ("comment", self.comment),
            ("html_link_generic", self.html_link_generic),
            ("corroboration_bonus", self.corroboration_bonus),
        ];
        for (name, value) in scores {
            if !(0.0..=1.0).contains(&value) {
                return Err(HunterError::Configuration(format!(
                    "score {name} must be within [0.0, 1.0], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Caller-supplied settings for one discovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Endpoints scoring strictly below this are filtered out.
    pub threshold: f64,
    /// Keep references outside the target's registrable domain.
    pub extend_scope: bool,
    /// Source kinds whose observations are kept.
    pub extractors: BTreeSet<SourceKind>,
    pub scores: ScoreTable,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            extend_scope: false,
            extractors: SourceKind::ALL.into_iter().collect(),
            scores: ScoreTable::default(),
        }
    }
}

impl DiscoveryConfig {
    /// Reject settings that would make a run meaningless. Called before
    /// any extraction begins.
    pub fn validate(&self) -> HunterResult<()> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(HunterError::Configuration(format!(
                "threshold must be within [0.0, 1.0], got {}",
                self.threshold
            )));
        }
        if self.extractors.is_empty() {
            return Err(HunterError::Configuration(
                "at least one extractor must be enabled".into(),
            ));
        }
        self.scores.validate()
    }

    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        self.extractors.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DiscoveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.extractors.len(), SourceKind::ALL.len());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let config = DiscoveryConfig {
            threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HunterError::Configuration(_))));

        let config = DiscoveryConfig {
            threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_extractor_set_rejected() {
        let config = DiscoveryConfig {
            extractors: BTreeSet::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HunterError::Configuration(_))));
    }

    #[test]
    fn test_bad_score_rejected() {
        let mut config = DiscoveryConfig::default();
        config.scores.comment = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_score_table_deserializes() {
        let table: ScoreTable = serde_json::from_str(r#"{"comment": 0.3}"#).unwrap();
        assert_eq!(table.comment, 0.3);
        assert_eq!(table.swagger, 1.0);
        assert_eq!(table.base_score(ScoreTier::CommonPathProtected), 0.6);
    }
}
