//! Visual encoding of closures.
//!
//! Maps a closure's (cause, severity) pair to the color, opacity and label
//! used to draw it. The table is built once at startup, from the built-in
//! rules plus any overrides from the configuration file, and is read-only
//! afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::closure::{Cause, Severity};
use crate::error::{Error, Result};

/// How a closure is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    /// Any CSS color understood by Leaflet.
    pub color: String,
    /// Stroke opacity, between 0 and 1.
    pub opacity: f64,
    /// Text shown in the popup's cause line.
    pub label: String,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: "gray".to_string(),
            opacity: 0.5,
            label: "Unclassified closure".to_string(),
        }
    }
}

/// A configured (cause, severity) → style mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    /// Upstream cause key, e.g. `roadMaintenance`.
    pub cause: String,
    /// Upstream severity key, e.g. `high`.
    pub severity: String,
    /// Color to draw with.
    pub color: String,
    /// Opacity to draw with.
    pub opacity: f64,
    /// Popup label; derived from the cause and severity when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Style settings as they appear in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Style for closures whose cause or severity isn't recognized.
    pub default: Style,
    /// Rules layered over the built-in table.
    pub rules: Vec<StyleRule>,
}

/// Built-in color for a recognized cause.
fn builtin_color(cause: &Cause) -> &'static str {
    match cause {
        Cause::AuthorityOperation => "orange",
        Cause::ConstructionWork | Cause::RoadMaintenance => "red",
        Cause::Other => "darkblue",
        Cause::Unrecognized(_) => "gray",
    }
}

/// Built-in opacity for a recognized severity.
fn builtin_opacity(severity: &Severity) -> f64 {
    match severity {
        Severity::Lowest => 0.2,
        Severity::Low => 0.25,
        Severity::Medium | Severity::Unrecognized(_) => 0.5,
        Severity::High => 0.8,
        Severity::Highest => 1.0,
    }
}

fn derived_label(cause: &Cause, severity: &Severity) -> String {
    format!("{} ({severity})", cause.label())
}

fn check_style(color: &str, opacity: f64, what: &str) -> Result<()> {
    if color.trim().is_empty() {
        return Err(Error::config(format!("{what}: color must not be empty")));
    }
    if !(0.0..=1.0).contains(&opacity) {
        return Err(Error::config(format!(
            "{what}: opacity {opacity} must be between 0 and 1"
        )));
    }
    Ok(())
}

/// Lookup table from (cause, severity) to style.
#[derive(Debug, Clone)]
pub struct StyleTable {
    rules: HashMap<(Cause, Severity), Style>,
    default: Style,
}

impl StyleTable {
    /// The built-in table: one rule for every recognized cause and severity.
    #[must_use]
    pub fn builtin() -> Self {
        let mut rules = HashMap::new();
        for cause in Cause::known() {
            for severity in Severity::known() {
                let style = Style {
                    color: builtin_color(&cause).to_string(),
                    opacity: builtin_opacity(&severity),
                    label: derived_label(&cause, &severity),
                };
                rules.insert((cause.clone(), severity), style);
            }
        }
        Self {
            rules,
            default: Style::default(),
        }
    }

    /// Build a table from configuration, layering its rules over the built-in ones.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a rule names an unknown cause or
    /// severity, has an empty color, or an opacity outside `[0, 1]`.
    pub fn from_config(config: &StyleConfig) -> Result<Self> {
        check_style(&config.default.color, config.default.opacity, "default style")?;

        let mut table = Self::builtin();
        table.default = config.default.clone();

        for rule in &config.rules {
            let cause = Cause::parse(&rule.cause);
            if !cause.is_recognized() {
                return Err(Error::config(format!(
                    "unknown cause '{}' in style rule",
                    rule.cause
                )));
            }
            let severity = Severity::parse(&rule.severity);
            if !severity.is_recognized() {
                return Err(Error::config(format!(
                    "unknown severity '{}' in style rule",
                    rule.severity
                )));
            }
            check_style(
                &rule.color,
                rule.opacity,
                &format!("style rule {}/{}", rule.cause, rule.severity),
            )?;

            let label = rule
                .label
                .clone()
                .unwrap_or_else(|| derived_label(&cause, &severity));
            table.rules.insert(
                (cause, severity),
                Style {
                    color: rule.color.clone(),
                    opacity: rule.opacity,
                    label,
                },
            );
        }

        Ok(table)
    }

    /// Resolve the style for a closure.
    ///
    /// Never fails: an unrecognized cause or severity gets the default style.
    #[must_use]
    pub fn resolve(&self, cause: &Cause, severity: &Severity) -> &Style {
        if !cause.is_recognized() || !severity.is_recognized() {
            return &self.default;
        }
        self.rules
            .get(&(cause.clone(), severity.clone()))
            .unwrap_or(&self.default)
    }

    /// The fallback style.
    #[must_use]
    pub fn default_style(&self) -> &Style {
        &self.default
    }

    /// Number of explicit rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no explicit rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// One (label, color) entry per recognized cause, then the fallback.
    ///
    /// Colors are taken from each cause's most severe rule.
    #[must_use]
    pub fn legend(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = Cause::known()
            .iter()
            .map(|cause| {
                let style = self.resolve(cause, &Severity::Highest);
                (cause.label().to_string(), style.color.clone())
            })
            .collect();
        entries.push((self.default.label.clone(), self.default.color.clone()));
        entries
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roadworks_high_is_red() {
        let table = StyleTable::builtin();
        let style = table.resolve(&Cause::parse("roadworks"), &Severity::parse("high"));
        assert_eq!(style.color, "red");
        assert!((style.opacity - 0.8).abs() < f64::EPSILON);
        assert_eq!(style.label, "Road maintenance (high)");
    }

    #[test]
    fn test_every_known_pair_has_a_rule() {
        let table = StyleTable::builtin();
        assert_eq!(table.len(), Cause::known().len() * Severity::known().len());
        for cause in Cause::known() {
            for severity in Severity::known() {
                let style = table.resolve(&cause, &severity);
                assert_eq!(style.color, builtin_color(&cause));
                assert!((style.opacity - builtin_opacity(&severity)).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn test_unknown_cause_gets_default() {
        let table = StyleTable::builtin();
        let style = table.resolve(&Cause::parse("flood"), &Severity::High);
        assert_eq!(style, &Style::default());
    }

    #[test]
    fn test_unknown_severity_gets_default() {
        let table = StyleTable::builtin();
        let style = table.resolve(&Cause::ConstructionWork, &Severity::parse("none"));
        assert_eq!(style, &Style::default());
        assert_eq!(style.color, "gray");
        assert!((style.opacity - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let table = StyleTable::builtin();
        let first = table.resolve(&Cause::Other, &Severity::Low).clone();
        let second = table.resolve(&Cause::Other, &Severity::Low).clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_config_rule_overrides_builtin() {
        let config = StyleConfig {
            rules: vec![StyleRule {
                cause: "constructionWork".to_string(),
                severity: "high".to_string(),
                color: "purple".to_string(),
                opacity: 0.9,
                label: Some("Big dig".to_string()),
            }],
            ..StyleConfig::default()
        };
        let table = StyleTable::from_config(&config).unwrap();

        let style = table.resolve(&Cause::ConstructionWork, &Severity::High);
        assert_eq!(style.color, "purple");
        assert_eq!(style.label, "Big dig");

        // Neighbouring rules keep their built-in values.
        let style = table.resolve(&Cause::ConstructionWork, &Severity::Low);
        assert_eq!(style.color, "red");
    }

    #[test]
    fn test_config_custom_default() {
        let config = StyleConfig {
            default: Style {
                color: "black".to_string(),
                opacity: 0.3,
                label: "Unknown".to_string(),
            },
            rules: Vec::new(),
        };
        let table = StyleTable::from_config(&config).unwrap();
        let style = table.resolve(&Cause::parse("flood"), &Severity::High);
        assert_eq!(style.color, "black");
    }

    #[test]
    fn test_config_rejects_unknown_cause() {
        let config = StyleConfig {
            rules: vec![StyleRule {
                cause: "flood".to_string(),
                severity: "high".to_string(),
                color: "blue".to_string(),
                opacity: 0.5,
                label: None,
            }],
            ..StyleConfig::default()
        };
        let err = StyleTable::from_config(&config).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("flood"));
    }

    #[test]
    fn test_config_rejects_bad_opacity() {
        let config = StyleConfig {
            rules: vec![StyleRule {
                cause: "other".to_string(),
                severity: "low".to_string(),
                color: "blue".to_string(),
                opacity: 1.5,
                label: None,
            }],
            ..StyleConfig::default()
        };
        let err = StyleTable::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("opacity"));
    }

    #[test]
    fn test_config_rejects_empty_default_color() {
        let mut config = StyleConfig::default();
        config.default.color = String::new();
        assert!(StyleTable::from_config(&config).is_err());
    }

    #[test]
    fn test_legend() {
        let legend = StyleTable::builtin().legend();
        assert_eq!(legend.len(), Cause::known().len() + 1);
        assert_eq!(legend[0], ("Local authority works".to_string(), "orange".to_string()));
        assert_eq!(legend.last().unwrap().1, "gray");
    }
}
