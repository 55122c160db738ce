//! DATEX II payload decoding.
//!
//! The closures API answers with a deeply nested DATEX II document. This
//! module mirrors the parts of it we read and flattens each situation record
//! into one [`ClosureRecord`] per location.
//!
//! Shape, abridged:
//!
//! ```text
//! D2Payload.situation[].situationRecord[]
//!     probabilityOfOccurrence
//!     generalPublicComment[].comment
//!     validity.validityStatus
//!     validity.validityTimeSpecification.{overallStartTime,overallEndTime}
//!     cause.causeType
//!     locationReference.locationReferencingLocationGroupByList.locationContainedInGroup[]
//!         locationReferencingPointLocation.pointAlongLinearElement[].linearElement.roadName
//!         locationReferencingLinearLocation.gmlLineString.posList
//!         locationReferencingLinearLocation.supplementaryPositionalDescription.carriageway[]
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::closure::{Cause, ClosureRecord, Geometry, Lanes, LatLon, Severity};
use crate::error::{Error, Result};

/// Validity status meaning "only valid between the overall start and end".
const TIME_SPEC_STATUS: &str = "definedByValidityTimeSpec";

/// Probability value for closures that will definitely happen.
const CERTAIN: &str = "certain";

/// Top-level document returned by the closures API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosuresPayload {
    /// The DATEX II body.
    #[serde(rename = "D2Payload")]
    pub d2_payload: D2Payload,
}

/// DATEX II body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct D2Payload {
    /// Reported situations.
    #[serde(default)]
    pub situation: Vec<Situation>,
}

/// A situation groups related records (e.g. both carriageways of one scheme).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Situation {
    /// Records making up this situation.
    #[serde(default)]
    pub situation_record: Vec<SituationRecord>,
}

/// A single reported event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SituationRecord {
    /// Upstream identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// How likely the event is, e.g. `certain` or `probable`.
    #[serde(default)]
    pub probability_of_occurrence: Option<String>,
    /// Free-text comments.
    #[serde(default)]
    pub general_public_comment: Vec<Comment>,
    /// When the record applies.
    #[serde(default)]
    pub validity: Option<Validity>,
    /// What caused it.
    #[serde(default)]
    pub cause: Option<CauseBlock>,
    /// Severity, when the upstream supplies one.
    #[serde(default)]
    pub severity: Option<String>,
    /// Where it is.
    #[serde(default)]
    pub location_reference: Option<LocationReference>,
}

/// A public comment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Comment {
    /// The comment text.
    #[serde(default)]
    pub comment: String,
}

/// Validity block of a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validity {
    /// E.g. `active` or `definedByValidityTimeSpec`.
    #[serde(default)]
    pub validity_status: Option<String>,
    /// The overall time window.
    pub validity_time_specification: ValidityTimeSpecification,
}

/// Overall time window of a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityTimeSpecification {
    /// Start of the window.
    pub overall_start_time: DateTime<Utc>,
    /// End of the window, absent for open-ended records.
    #[serde(default)]
    pub overall_end_time: Option<DateTime<Utc>>,
}

/// Cause block of a record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CauseBlock {
    /// E.g. `roadMaintenance`.
    #[serde(default)]
    pub cause_type: Option<String>,
}

/// Location reference: either a group of locations or a single one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationReference {
    /// Several locations sharing one record.
    #[serde(default)]
    pub location_referencing_location_group_by_list: Option<LocationGroup>,
    /// A single location given inline.
    #[serde(flatten)]
    pub single: Location,
}

impl LocationReference {
    /// All locations referenced, in upstream order.
    #[must_use]
    pub fn locations(&self) -> Vec<&Location> {
        match &self.location_referencing_location_group_by_list {
            Some(group) => group.location_contained_in_group.iter().collect(),
            None if !self.single.is_empty() => vec![&self.single],
            None => Vec::new(),
        }
    }
}

/// A group of locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationGroup {
    /// Member locations.
    #[serde(default)]
    pub location_contained_in_group: Vec<Location>,
}

/// One location, described both as points along roads and as a line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Point description, carrying road names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_referencing_point_location: Option<PointLocation>,
    /// Linear description, carrying geometry and lanes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_referencing_linear_location: Option<LinearLocation>,
}

impl Location {
    fn is_empty(&self) -> bool {
        self.location_referencing_point_location.is_none()
            && self.location_referencing_linear_location.is_none()
    }

    /// Road names along this location, de-duplicated in order.
    #[must_use]
    pub fn road_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let points = self
            .location_referencing_point_location
            .iter()
            .flat_map(|p| &p.point_along_linear_element);
        for point in points {
            if let Some(name) = &point.linear_element.road_name {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Geometry of this location.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the position list is malformed or there are
    /// no coordinates at all.
    pub fn geometry(&self) -> Result<Geometry> {
        if let Some(line) = self
            .location_referencing_linear_location
            .as_ref()
            .and_then(|l| l.gml_line_string.as_ref())
        {
            if let Some(geometry) = Geometry::from_positions(parse_pos_list(&line.pos_list)?) {
                return Ok(geometry);
            }
        }

        self.location_referencing_point_location
            .as_ref()
            .and_then(|p| p.point_by_coordinates.as_ref())
            .map(|p| {
                Geometry::Point(LatLon::new(
                    p.point_coordinates.latitude,
                    p.point_coordinates.longitude,
                ))
            })
            .ok_or_else(|| Error::parse("location has no coordinates"))
    }

    /// Largest operational and restricted lane counts over all carriageways.
    #[must_use]
    pub fn lanes(&self) -> Option<Lanes> {
        let extensions = self
            .location_referencing_linear_location
            .iter()
            .filter_map(|l| l.supplementary_positional_description.as_ref())
            .flat_map(|d| &d.carriageway)
            .filter_map(|c| c.extension.as_ref());

        let counts = extensions.filter_map(|ext| {
            Some((
                ext.number_of_operational_lanes.value()?,
                ext.number_of_lanes_restricted.value()?,
            ))
        });

        counts.fold(None, |acc: Option<Lanes>, (operational, restricted)| {
            Some(match acc {
                Some(lanes) => Lanes {
                    operational: lanes.operational.max(operational),
                    restricted: lanes.restricted.max(restricted),
                },
                None => Lanes {
                    operational,
                    restricted,
                },
            })
        })
    }
}

/// Point description of a location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointLocation {
    /// Points along named roads.
    #[serde(default)]
    pub point_along_linear_element: Vec<PointAlongLinearElement>,
    /// A bare coordinate, used when there's no line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_by_coordinates: Option<PointByCoordinates>,
}

/// A point on a named road.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointAlongLinearElement {
    /// The road.
    #[serde(default)]
    pub linear_element: LinearElement,
}

/// A named road.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearElement {
    /// E.g. `M25`.
    #[serde(default)]
    pub road_name: Option<String>,
}

/// Wrapper around a bare coordinate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointByCoordinates {
    /// The coordinate.
    pub point_coordinates: PointCoordinates,
}

/// A bare coordinate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCoordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Linear description of a location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearLocation {
    /// The line itself.
    #[serde(default)]
    pub gml_line_string: Option<GmlLineString>,
    /// Carriageway and lane details.
    #[serde(default)]
    pub supplementary_positional_description: Option<SupplementaryPositionalDescription>,
}

/// GML line string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmlLineString {
    /// Whitespace-separated `lon lat` pairs.
    #[serde(default)]
    pub pos_list: String,
}

/// Carriageway details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplementaryPositionalDescription {
    /// Affected carriageways.
    #[serde(default)]
    pub carriageway: Vec<Carriageway>,
}

/// One carriageway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Carriageway {
    /// National Highways extension with lane counts.
    #[serde(rename = "_carriagewayExtensionG", default)]
    pub extension: Option<CarriagewayExtension>,
}

/// Lane counts for one carriageway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarriagewayExtension {
    /// Lanes still open.
    pub number_of_operational_lanes: LaneCount,
    /// Lanes closed or restricted.
    pub number_of_lanes_restricted: LaneCount,
}

/// A lane count, which the upstream sometimes sends as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LaneCount {
    /// A JSON number.
    Number(u32),
    /// A JSON string holding a number.
    Text(String),
}

impl LaneCount {
    /// The count, or `None` when the text isn't a number.
    #[must_use]
    pub fn value(&self) -> Option<u32> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Parse a GML `posList` of `lon lat` pairs into positions.
///
/// # Errors
///
/// Returns a parse error for non-numeric or non-finite values, or an odd
/// number of values.
pub fn parse_pos_list(pos_list: &str) -> Result<Vec<LatLon>> {
    let values = pos_list
        .split_whitespace()
        .map(|v| {
            v.parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| Error::parse(format!("invalid coordinate '{v}' in posList")))
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.len() % 2 != 0 {
        return Err(Error::parse(format!(
            "posList has an odd number of values ({})",
            values.len()
        )));
    }

    Ok(values
        .chunks_exact(2)
        .map(|pair| LatLon::new(pair[1], pair[0]))
        .collect())
}

/// Decode a raw response body.
///
/// # Errors
///
/// Returns a parse error if the body isn't a DATEX II closures document.
pub fn decode(body: &[u8]) -> Result<ClosuresPayload> {
    serde_json::from_slice(body).map_err(|e| Error::parse(e.to_string()))
}

fn is_current(record: &SituationRecord, now: DateTime<Utc>) -> bool {
    let Some(validity) = &record.validity else {
        return true;
    };
    if validity.validity_status.as_deref() != Some(TIME_SPEC_STATUS) {
        return true;
    }
    let window = &validity.validity_time_specification;
    window.overall_start_time < now && window.overall_end_time.map_or(true, |end| now < end)
}

fn is_certain(record: &SituationRecord) -> bool {
    record
        .probability_of_occurrence
        .as_deref()
        .is_some_and(|p| p.eq_ignore_ascii_case(CERTAIN))
}

/// Flatten a payload into closure records that are certain and current at `now`.
///
/// # Errors
///
/// Returns a parse error if a kept record has no validity window, no
/// locations, or a location with unusable coordinates.
pub fn extract_closures(
    payload: &ClosuresPayload,
    now: DateTime<Utc>,
) -> Result<Vec<ClosureRecord>> {
    let situations = &payload.d2_payload.situation;
    let mut closures = Vec::new();
    let mut skipped = 0_usize;

    for (i, situation) in situations.iter().enumerate() {
        debug!("Processing situation {} of {}", i + 1, situations.len());
        for (j, record) in situation.situation_record.iter().enumerate() {
            if !is_certain(record) || !is_current(record, now) {
                skipped += 1;
                continue;
            }

            let id = record
                .id
                .clone()
                .unwrap_or_else(|| format!("situation-{}-record-{}", i + 1, j + 1));
            let window = &record
                .validity
                .as_ref()
                .ok_or_else(|| Error::parse(format!("record {id} has no validity")))?
                .validity_time_specification;
            let cause = Cause::parse(
                record
                    .cause
                    .as_ref()
                    .and_then(|c| c.cause_type.as_deref())
                    .unwrap_or("unspecified"),
            );
            let description = record
                .general_public_comment
                .iter()
                .map(|c| c.comment.trim())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            let locations = record
                .location_reference
                .as_ref()
                .map(LocationReference::locations)
                .unwrap_or_default();
            if locations.is_empty() {
                return Err(Error::parse(format!("record {id} has no locations")));
            }
            let multiple = locations.len() > 1;

            for (k, location) in locations.into_iter().enumerate() {
                let geometry = location.geometry().map_err(|e| match e {
                    Error::Parse { message } => Error::parse(format!("record {id}: {message}")),
                    other => other,
                })?;
                let lanes = location.lanes();
                let severity = record
                    .severity
                    .as_deref()
                    .map_or_else(|| Severity::from_lanes(lanes), Severity::parse);

                closures.push(ClosureRecord {
                    id: if multiple {
                        format!("{id}#{}", k + 1)
                    } else {
                        id.clone()
                    },
                    geometry,
                    description: description.clone(),
                    road_names: location.road_names(),
                    cause: cause.clone(),
                    severity,
                    start: window.overall_start_time,
                    end: window.overall_end_time,
                    lanes,
                });
            }
        }
    }

    info!(
        closures = closures.len(),
        situations = situations.len(),
        skipped,
        "Extracted closures"
    );
    Ok(closures)
}

/// Decode a raw response body and extract current closures in one go.
///
/// # Errors
///
/// Returns a parse error if decoding or extraction fails.
pub fn parse_closures(body: &[u8], now: DateTime<Utc>) -> Result<Vec<ClosureRecord>> {
    extract_closures(&decode(body)?, now)
}
