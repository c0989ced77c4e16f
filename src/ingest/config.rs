// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::ingest::types::{SourceDescriptor, SourceKind};

const ENV_PATH: &str = "RADAR_SOURCES";

/// One row of the source table as written on disk.
#[derive(Debug, Deserialize)]
struct SourceRow {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    url: String,
    #[serde(default)]
    fallback_url: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default = "default_verify_ssl")]
    verify_ssl: bool,
}

fn default_verify_ssl() -> bool {
    true
}

/// Load sources from an explicit path. Supports TOML (`[[sources]]`) or JSON (array of rows).
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceDescriptor>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
        .with_context(|| format!("parsing sources from {}", path.display()))
}

/// Load sources using env var + fallbacks:
/// 1) $RADAR_SOURCES
/// 2) config/sources.toml
/// 3) config/sources.json
pub fn load_sources_default() -> Result<Vec<SourceDescriptor>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("RADAR_SOURCES points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceDescriptor>> {
    let rows = match hint_ext {
        "toml" => parse_toml(s)?,
        "json" => parse_json(s)?,
        _ if looks_like_json(s) => parse_json(s)?,
        _ => parse_toml(s)?,
    };
    Ok(into_descriptors(rows))
}

/// Only used without an extension. `[[sources]]` is a TOML array-of-tables header.
fn looks_like_json(s: &str) -> bool {
    let t = s.trim_start();
    t.starts_with('[') && !t.starts_with("[[")
}

fn parse_toml(s: &str) -> Result<Vec<SourceRow>> {
    #[derive(Deserialize)]
    struct TomlSources {
        #[serde(default)]
        sources: Vec<SourceRow>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(v.sources)
}

fn parse_json(s: &str) -> Result<Vec<SourceRow>> {
    let v: Vec<SourceRow> = serde_json::from_str(s)?;
    Ok(v)
}

fn into_descriptors(rows: Vec<SourceRow>) -> Vec<SourceDescriptor> {
    rows.into_iter()
        .filter_map(|row| {
            let Some(kind) = SourceKind::from_type_str(&row.kind) else {
                warn!(target: "ingest", source = %row.name, kind = %row.kind, "unsupported source type, skipping");
                return None;
            };
            Some(SourceDescriptor {
                name: row.name.trim().to_string(),
                kind,
                url: row.url.trim().to_string(),
                fallback_url: row
                    .fallback_url
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty()),
                limit: row.limit,
                verify_tls: row.verify_ssl,
            })
        })
        .collect()
}
