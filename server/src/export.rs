use crate::model::{SolutionKind, SolutionRecord};
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tdoacore::events::ReceiverTable;
use tdoacore::geodesy::LatLon;

/// Writes one self-contained Leaflet map per accepted solution: receiver
/// markers plus either the locus polyline or the position marker. The file
/// is the whole artifact; nothing downstream needs to know its format.
pub struct HtmlMapExporter {
    out_dir: PathBuf,
}

impl HtmlMapExporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn write(
        &self,
        record: &SolutionRecord,
        receivers: &ReceiverTable,
    ) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.out_dir).with_context(|| {
            format!("creating artifact directory {}", self.out_dir.display())
        })?;

        let name = format!(
            "emission_{}.html",
            record.emission_time.format("%Y%m%dT%H%M%S%.3fZ")
        );
        let path = self.out_dir.join(name);

        let html = render_map(record, receivers)?;
        fs::write(&path, html)
            .with_context(|| format!("writing map artifact {}", path.display()))?;
        Ok(path)
    }
}

fn render_map(record: &SolutionRecord, receivers: &ReceiverTable) -> anyhow::Result<String> {
    let center = record
        .position
        .or_else(|| receivers.centroid())
        .unwrap_or(LatLon::new(0.0, 0.0));

    let mut layers = String::new();
    for profile in receivers.iter() {
        layers.push_str(&format!(
            "L.marker([{:.6}, {:.6}]).addTo(map).bindPopup({});\n",
            profile.latitude_deg,
            profile.longitude_deg,
            serde_json::to_string(&profile.id.to_string())?
        ));
    }

    match record.kind {
        SolutionKind::Locus => {
            let coords: Vec<[f64; 2]> = record
                .points
                .iter()
                .map(|p| [p.lat_deg, p.lon_deg])
                .collect();
            layers.push_str(&format!(
                "L.polyline({}, {{color: 'red', weight: 2.5}}).addTo(map);\n",
                serde_json::to_string(&coords)?
            ));
        }
        SolutionKind::Position => {
            if let Some(position) = record.position {
                layers.push_str(&format!(
                    "L.circleMarker([{:.6}, {:.6}], {{radius: 8, color: 'red'}}).addTo(map).bindPopup('estimated emitter');\n",
                    position.lat_deg, position.lon_deg
                ));
            }
        }
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8"/>
<title>Emission {time}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css"/>
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
var map = L.map('map').setView([{lat:.6}, {lon:.6}], 14);
L.tileLayer('https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
  attribution: '&copy; OpenStreetMap contributors'
}}).addTo(map);
{layers}</script>
</body>
</html>
"#,
        time = record.emission_time,
        lat = center.lat_deg,
        lon = center.lon_deg,
        layers = layers,
    ))
}
