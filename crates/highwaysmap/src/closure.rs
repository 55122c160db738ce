//! Core closure types for highwaysmap.
//!
//! This module defines the data structures for a single road closure as
//! reported by the upstream API, after it has been pulled out of the raw
//! DATEX II payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What caused a closure.
///
/// The upstream vocabulary is open-ended; values outside the known set are
/// kept verbatim so the styling layer can fall back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Cause {
    /// Works carried out by a local authority.
    AuthorityOperation,
    /// Construction work.
    ConstructionWork,
    /// Road maintenance, also reported as `roadworks`.
    RoadMaintenance,
    /// The upstream's own catch-all.
    Other,
    /// Anything the upstream sends that isn't in the list above.
    Unrecognized(String),
}

impl Cause {
    /// Every recognized cause, in display order.
    #[must_use]
    pub fn known() -> [Self; 4] {
        [
            Self::AuthorityOperation,
            Self::ConstructionWork,
            Self::RoadMaintenance,
            Self::Other,
        ]
    }

    /// Parse an upstream `causeType` value.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "authorityoperation" => Self::AuthorityOperation,
            "constructionwork" => Self::ConstructionWork,
            "roadmaintenance" | "roadworks" => Self::RoadMaintenance,
            "other" => Self::Other,
            _ => Self::Unrecognized(raw.to_string()),
        }
    }

    /// The canonical key for this cause, as used in the style table.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthorityOperation => "authorityOperation",
            Self::ConstructionWork => "constructionWork",
            Self::RoadMaintenance => "roadMaintenance",
            Self::Other => "other",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Human-readable name for popups and the legend.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::AuthorityOperation => "Local authority works",
            Self::ConstructionWork => "Construction work",
            Self::RoadMaintenance => "Road maintenance",
            Self::Other => "Other",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Whether this cause is part of the known vocabulary.
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl std::fmt::Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Cause {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Cause> for String {
    fn from(cause: Cause) -> Self {
        cause.as_str().to_string()
    }
}

/// How severe a closure is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    /// Barely noticeable.
    Lowest,
    /// Some lanes restricted, traffic still flowing.
    Low,
    /// Noticeable disruption.
    Medium,
    /// Serious disruption.
    High,
    /// Carriageway fully closed.
    Highest,
    /// Anything else the upstream sends.
    Unrecognized(String),
}

impl Severity {
    /// Every recognized severity, from least to most severe.
    #[must_use]
    pub fn known() -> [Self; 5] {
        [
            Self::Lowest,
            Self::Low,
            Self::Medium,
            Self::High,
            Self::Highest,
        ]
    }

    /// Parse an upstream `severity` value.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lowest" => Self::Lowest,
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "highest" => Self::Highest,
            _ => Self::Unrecognized(raw.to_string()),
        }
    }

    /// Derive a severity from lane counts when the upstream gives none.
    ///
    /// No operational lanes means the road is shut; anything else (including
    /// not knowing) is treated as a partial closure.
    #[must_use]
    pub fn from_lanes(lanes: Option<Lanes>) -> Self {
        match lanes {
            Some(lanes) if lanes.is_fully_closed() => Self::Highest,
            _ => Self::Low,
        }
    }

    /// The canonical key for this severity, as used in the style table.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Lowest => "lowest",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Highest => "highest",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Whether this severity is part of the known vocabulary.
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Severity {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.as_str().to_string()
    }
}

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl LatLon {
    /// Create a new position.
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Where a closure is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "positions", rename_all = "snake_case")]
pub enum Geometry {
    /// A single location.
    Point(LatLon),
    /// A stretch of road, at least two positions long.
    Line(Vec<LatLon>),
}

impl Geometry {
    /// Build a geometry from a list of positions.
    ///
    /// Returns `None` for an empty list.
    #[must_use]
    pub fn from_positions(mut positions: Vec<LatLon>) -> Option<Self> {
        match positions.len() {
            0 => None,
            1 => positions.pop().map(Self::Point),
            _ => Some(Self::Line(positions)),
        }
    }

    /// All positions making up this geometry.
    #[must_use]
    pub fn positions(&self) -> &[LatLon] {
        match self {
            Self::Point(position) => std::slice::from_ref(position),
            Self::Line(positions) => positions,
        }
    }
}

/// Lane counts reported for the affected carriageway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lanes {
    /// Lanes still open to traffic.
    pub operational: u32,
    /// Lanes closed or restricted.
    pub restricted: u32,
}

impl Lanes {
    /// Whether no lanes are left open.
    #[must_use]
    pub fn is_fully_closed(&self) -> bool {
        self.operational == 0
    }
}

/// A single road closure.
///
/// Produced by the upstream client for one location of one situation
/// record; lives for the duration of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureRecord {
    /// Upstream identifier, suffixed `#n` when a record covers several locations.
    pub id: String,
    /// Where the closure is.
    pub geometry: Geometry,
    /// Free-text description from the upstream's public comments.
    pub description: String,
    /// Names of the roads affected, without duplicates.
    pub road_names: Vec<String>,
    /// What caused it.
    pub cause: Cause,
    /// How severe it is.
    pub severity: Severity,
    /// When it starts.
    pub start: DateTime<Utc>,
    /// When it ends; `None` when open-ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Lane counts, if the upstream reported any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lanes: Option<Lanes>,
}

impl ClosureRecord {
    /// Display name: the affected road names joined with spaces.
    #[must_use]
    pub fn name(&self) -> String {
        self.road_names.join(" ")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::TimeZone;

    use super::*;

    /// A closure on the M25 used across the crate's tests.
    pub(crate) fn sample_record(cause: &str, severity: &str) -> ClosureRecord {
        ClosureRecord {
            id: "GUID-1".to_string(),
            geometry: Geometry::Line(vec![
                LatLon::new(51.50, -0.12),
                LatLon::new(51.51, -0.13),
            ]),
            description: "Lane closed for resurfacing".to_string(),
            road_names: vec!["M25".to_string()],
            cause: Cause::parse(cause),
            severity: Severity::parse(severity),
            start: Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap(),
            end: Some(Utc.with_ymd_and_hms(2024, 3, 2, 6, 0, 0).unwrap()),
            lanes: Some(Lanes {
                operational: 2,
                restricted: 1,
            }),
        }
    }

    #[test]
    fn test_cause_parse() {
        assert_eq!(Cause::parse("authorityOperation"), Cause::AuthorityOperation);
        assert_eq!(Cause::parse("constructionWork"), Cause::ConstructionWork);
        assert_eq!(Cause::parse("roadMaintenance"), Cause::RoadMaintenance);
        assert_eq!(Cause::parse("roadworks"), Cause::RoadMaintenance);
        assert_eq!(Cause::parse("other"), Cause::Other);
        assert_eq!(
            Cause::parse("alienInvasion"),
            Cause::Unrecognized("alienInvasion".to_string())
        );
    }

    #[test]
    fn test_cause_display_and_label() {
        assert_eq!(Cause::RoadMaintenance.to_string(), "roadMaintenance");
        assert_eq!(Cause::RoadMaintenance.label(), "Road maintenance");
        assert_eq!(Cause::AuthorityOperation.label(), "Local authority works");
        assert_eq!(Cause::parse("flood").label(), "flood");
    }

    #[test]
    fn test_cause_recognized() {
        assert!(Cause::known().iter().all(Cause::is_recognized));
        assert!(!Cause::parse("").is_recognized());
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("HIGH"), Severity::High);
        assert_eq!(Severity::parse("lowest"), Severity::Lowest);
        assert_eq!(
            Severity::parse("unknown"),
            Severity::Unrecognized("unknown".to_string())
        );
    }

    #[test]
    fn test_severity_from_lanes() {
        let closed = Lanes {
            operational: 0,
            restricted: 3,
        };
        let partial = Lanes {
            operational: 1,
            restricted: 2,
        };
        assert_eq!(Severity::from_lanes(Some(closed)), Severity::Highest);
        assert_eq!(Severity::from_lanes(Some(partial)), Severity::Low);
        assert_eq!(Severity::from_lanes(None), Severity::Low);
    }

    #[test]
    fn test_geometry_from_positions() {
        assert!(Geometry::from_positions(Vec::new()).is_none());

        let point = Geometry::from_positions(vec![LatLon::new(52.0, -1.0)]).unwrap();
        assert_eq!(point, Geometry::Point(LatLon::new(52.0, -1.0)));
        assert_eq!(point.positions().len(), 1);

        let line = Geometry::from_positions(vec![LatLon::new(52.0, -1.0), LatLon::new(52.1, -1.1)])
            .unwrap();
        assert!(matches!(line, Geometry::Line(_)));
        assert_eq!(line.positions().len(), 2);
    }

    #[test]
    fn test_record_name() {
        let mut record = sample_record("roadworks", "high");
        record.road_names.push("A1(M)".to_string());
        assert_eq!(record.name(), "M25 A1(M)");
    }

    #[test]
    fn test_record_serialization() {
        let record = sample_record("roadworks", "high");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"cause\":\"roadMaintenance\""));
        assert!(json.contains("\"severity\":\"high\""));
        assert!(json.contains("\"type\":\"line\""));

        let back: ClosureRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
