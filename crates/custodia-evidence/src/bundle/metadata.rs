//! Best-effort sidecar metadata extraction.
//!
//! A media file `name.ext` may carry a JSON sidecar next to it; the
//! first present of `name.ext.proof.json`, `name.ext.json`,
//! `name.proof.json`, `name.json` wins. Sidecars that fail to read or
//! parse never fail the ingestion, the media file simply carries no
//! metadata.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::bundle::extract::ExtractedFile;
use crate::types::{GeoPoint, MediaMetadata};

const CAPTURE_KEYS: &[&str] = &["Proof Generated", "File Modified"];
const DEVICE_KEYS: &[&str] = &["Hardware", "Manufacturer", "DeviceID", "Language", "Locale"];
const NETWORK_KEYS: &[&str] = &[
    "Network",
    "NetworkType",
    "DataType",
    "CellInfo",
    "IPv4",
    "IPv6",
    "WiFi MAC",
];

/// Sidecar names for `media_rel`, most specific first.
pub fn sidecar_candidates(media_rel: &str) -> Vec<String> {
    let mut candidates = vec![
        format!("{media_rel}.proof.json"),
        format!("{media_rel}.json"),
    ];
    let file_name = media_rel.rsplit('/').next().unwrap_or(media_rel);
    if let Some(dot) = file_name.rfind('.') {
        let stem = &media_rel[..media_rel.len() - (file_name.len() - dot)];
        candidates.push(format!("{stem}.proof.json"));
        candidates.push(format!("{stem}.json"));
    }
    candidates
}

/// Whether `rel` names a sidecar of some other file in the bundle.
pub fn is_sidecar_of_any(rel: &str, files: &[ExtractedFile]) -> bool {
    if !rel.ends_with(".json") {
        return false;
    }
    files
        .iter()
        .filter(|f| f.rel_path != rel)
        .any(|f| sidecar_candidates(&f.rel_path).iter().any(|c| c == rel))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(dt.with_timezone(&Utc));
    }
    // Trailing zone names ("UTC", "GMT") are dropped, anything else naive
    // is taken as UTC.
    let naive = raw
        .strip_suffix(" UTC")
        .or_else(|| raw.strip_suffix(" GMT"))
        .unwrap_or(raw);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc())
}

fn capture_time(map: &Map<String, Value>) -> Option<DateTime<Utc>> {
    CAPTURE_KEYS
        .iter()
        .filter_map(|key| map.get(*key)?.as_str())
        .find_map(parse_timestamp)
}

fn location(map: &Map<String, Value>) -> Option<GeoPoint> {
    let latitude = as_f64(map.get("Location.Latitude")?)?;
    let longitude = as_f64(map.get("Location.Longitude")?)?;
    let mut point = GeoPoint::checked(latitude, longitude)?;
    point.altitude = map.get("Location.Altitude").and_then(as_f64);
    point.accuracy = map.get("Location.Accuracy").and_then(as_f64);
    Some(point)
}

fn block(map: &Map<String, Value>, name: &str, flat_keys: &[&str]) -> Option<Value> {
    if let Some(Value::Object(obj)) = map.get(name) {
        return Some(Value::Object(obj.clone()));
    }
    let collected: Map<String, Value> = flat_keys
        .iter()
        .filter_map(|key| Some(((*key).to_string(), map.get(*key)?.clone())))
        .collect();
    if collected.is_empty() {
        None
    } else {
        Some(Value::Object(collected))
    }
}

fn from_sidecar(map: &Map<String, Value>) -> MediaMetadata {
    MediaMetadata {
        captured_at: capture_time(map),
        location: location(map),
        device: block(map, "Device", DEVICE_KEYS),
        network: block(map, "Network", NETWORK_KEYS),
    }
}

/// Resolve and parse the sidecar for `media_rel`, if any.
pub fn metadata_for(media_rel: &str, files: &[ExtractedFile]) -> MediaMetadata {
    let Some(sidecar) = sidecar_candidates(media_rel)
        .into_iter()
        .find_map(|candidate| files.iter().find(|f| f.rel_path == candidate))
    else {
        return MediaMetadata::default();
    };

    let bytes = match std::fs::read(&sidecar.disk_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(sidecar = %sidecar.rel_path, error = %e, "sidecar unreadable");
            return MediaMetadata::default();
        }
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => from_sidecar(&map),
        Ok(_) => {
            tracing::debug!(sidecar = %sidecar.rel_path, "sidecar is not a JSON object");
            MediaMetadata::default()
        }
        Err(e) => {
            tracing::debug!(sidecar = %sidecar.rel_path, error = %e, "sidecar parse failed");
            MediaMetadata::default()
        }
    }
}
