//! Map rendering.
//!
//! Turns closure records into [`MapOverlay`]s and lays them out as a
//! self-contained Leaflet page. Output depends only on the records, the
//! style table and the map configuration, so the same input always renders
//! the same bytes.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::closure::{ClosureRecord, Geometry, Lanes};
use crate::config::MapConfig;
use crate::error::Result;
use crate::style::StyleTable;

/// Leaflet release loaded by rendered pages.
const LEAFLET_VERSION: &str = "1.9.4";

/// Radius of point markers, in pixels.
const MARKER_RADIUS: u32 = 6;

/// One closure as drawn on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapOverlay {
    /// Closure identifier.
    pub id: String,
    /// Where to draw.
    pub geometry: Geometry,
    /// Stroke color.
    pub color: String,
    /// Stroke opacity.
    pub opacity: f64,
    /// Stroke width in pixels.
    pub weight: u32,
    /// Popup HTML, already escaped.
    pub popup: String,
}

/// Escape text for inclusion in HTML.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serialize a value as JSON that can sit inside a `<script>` element.
fn script_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

fn lane_text(lanes: Option<Lanes>, pick: fn(Lanes) -> u32) -> String {
    lanes.map_or_else(|| "unknown".to_string(), |l| pick(l).to_string())
}

/// Builds overlays and pages from closure records.
#[derive(Debug, Clone)]
pub struct MapRenderer {
    map: MapConfig,
    styles: Arc<StyleTable>,
}

impl MapRenderer {
    /// Create a renderer.
    #[must_use]
    pub fn new(map: MapConfig, styles: Arc<StyleTable>) -> Self {
        Self { map, styles }
    }

    /// The style table in use.
    #[must_use]
    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    fn format_time(&self, time: DateTime<Utc>) -> String {
        format!("{} UTC", time.format(&self.map.time_format))
    }

    /// Popup HTML for a record.
    #[must_use]
    pub fn popup(&self, record: &ClosureRecord) -> String {
        let style = self.styles.resolve(&record.cause, &record.severity);
        let end = record
            .end
            .map_or_else(|| "Until further notice".to_string(), |t| self.format_time(t));

        format!(
            "<div class=\"closure\">\
             <b>Name:</b> {}<br>\
             <b>Description:</b> {}<br>\
             <b>From:</b> {}<br>\
             <b>To:</b> {}<br>\
             <b>Cause:</b> {}<br>\
             <b>Open lanes:</b> {}<br>\
             <b>Closed lanes:</b> {}\
             </div>",
            escape_html(&record.name()),
            escape_html(&record.description),
            escape_html(&self.format_time(record.start)),
            escape_html(&end),
            escape_html(&style.label),
            lane_text(record.lanes, |l| l.operational),
            lane_text(record.lanes, |l| l.restricted),
        )
    }

    /// The overlay for one record.
    #[must_use]
    pub fn overlay(&self, record: &ClosureRecord) -> MapOverlay {
        let style = self.styles.resolve(&record.cause, &record.severity);
        MapOverlay {
            id: record.id.clone(),
            geometry: record.geometry.clone(),
            color: style.color.clone(),
            opacity: style.opacity,
            weight: self.map.line_weight,
            popup: self.popup(record),
        }
    }

    /// One overlay per record, in record order.
    #[must_use]
    pub fn overlays(&self, records: &[ClosureRecord]) -> Vec<MapOverlay> {
        records.iter().map(|r| self.overlay(r)).collect()
    }

    /// Render the full map page.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlays cannot be serialized.
    pub fn render(&self, records: &[ClosureRecord]) -> Result<String> {
        let overlays = self.overlays(records);
        debug!(overlays = overlays.len(), "Rendering map");
        self.page(&overlays)
    }

    fn legend_html(&self) -> String {
        let mut html = String::from("<div class=\"legend\"><b>Cause</b>");
        for (label, color) in self.styles.legend() {
            let _ = write!(
                html,
                "<div><span class=\"swatch\" style=\"background:{}\"></span>{}</div>",
                escape_html(&color),
                escape_html(&label)
            );
        }
        html.push_str("</div>");
        html
    }

    fn page(&self, overlays: &[MapOverlay]) -> Result<String> {
        let title = escape_html(&self.map.title);
        let count = match overlays.len() {
            1 => "1 closure".to_string(),
            n => format!("{n} closures"),
        };

        let mut html = String::with_capacity(4096 + overlays.len() * 512);
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
        );
        let _ = writeln!(html, "<title>{title}</title>");
        let _ = writeln!(
            html,
            "<link rel=\"stylesheet\" href=\"https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.css\">"
        );
        let _ = writeln!(
            html,
            "<script src=\"https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.js\"></script>"
        );
        html.push_str(STYLESHEET);
        html.push_str("</head>\n<body>\n");
        let _ = writeln!(
            html,
            "<header><h1>{title}</h1><span class=\"count\">{count}</span></header>"
        );
        html.push_str("<div id=\"map\"></div>\n");
        html.push_str(&self.legend_html());
        html.push_str("\n<script>\n");
        let _ = writeln!(
            html,
            "const view = {{center: [{}, {}], zoom: {}}};",
            self.map.center_lat, self.map.center_lon, self.map.zoom
        );
        let _ = writeln!(html, "const tiles = {};", script_json(&self.map.tile_url)?);
        let _ = writeln!(
            html,
            "const attribution = {};",
            script_json(&self.map.attribution)?
        );
        let _ = writeln!(html, "const markerRadius = {MARKER_RADIUS};");
        let _ = writeln!(html, "const overlays = {};", script_json(overlays)?);
        html.push_str(SCRIPT);
        html.push_str("</script>\n</body>\n</html>\n");
        Ok(html)
    }
}

const STYLESHEET: &str = r"<style>
html, body { height: 100%; margin: 0; font-family: Arial, sans-serif; }
header { display: flex; align-items: baseline; gap: 1em; padding: 0.5em 1em; background: #1d3557; color: #fff; }
header h1 { font-size: 1.2em; margin: 0; }
#map { position: absolute; top: 2.6em; bottom: 0; left: 0; right: 0; }
.closure { font-size: 14px; line-height: 1.4; }
.legend { position: absolute; bottom: 1.5em; left: 1em; z-index: 1000; background: #fff; padding: 0.5em 0.75em; border-radius: 4px; font-size: 13px; box-shadow: 0 1px 4px rgba(0,0,0,0.3); }
.swatch { display: inline-block; width: 1em; height: 0.4em; margin-right: 0.5em; vertical-align: middle; }
</style>
";

const SCRIPT: &str = r"const map = L.map('map').setView(view.center, view.zoom);
L.tileLayer(tiles, {attribution: attribution, maxZoom: 19}).addTo(map);
for (const o of overlays) {
  const style = {color: o.color, opacity: o.opacity, weight: o.weight};
  let layer;
  if (o.geometry.type === 'line') {
    layer = L.polyline(o.geometry.positions.map(p => [p.lat, p.lon]), style);
  } else {
    const p = o.geometry.positions;
    layer = L.circleMarker([p.lat, p.lon], Object.assign({radius: markerRadius, fillColor: o.color, fillOpacity: o.opacity}, style));
  }
  layer.bindTooltip(o.popup).bindPopup(o.popup).addTo(map);
}
";
