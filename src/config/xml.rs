//! XML configuration support.
//! - Loads settings from config.xml (quick_xml).
//! - Creates a secure template if missing (unless SHUNT_CONFIG is set).
//!
//! Notes:
//! - This module only reads/writes the config file; destination validation
//!   and route compilation happen in `build`.
//! - Unknown XML fields are a hard failure to surface misconfigurations early.

use anyhow::{Context, Result, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::paths::default_config_path;
use super::types::{Config, DestinationConfig, FilterConfig, LogLevel, RouteConfig};
use super::{SCAN_DEPTH_DEFAULT, SOURCE_BASE_DEFAULT};

/// Environment variable naming an explicit config file location.
pub const CONFIG_ENV: &str = "SHUNT_CONFIG";

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    source_base: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
    #[serde(default, deserialize_with = "de_usize_trimmed_opt")]
    scan_depth: Option<usize>,
    destinations: Option<XmlDestinations>,
    routes: Option<XmlRoutes>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlDestinations {
    #[serde(rename = "destination", default)]
    entries: Vec<XmlDestination>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlDestination {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@path")]
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlRoutes {
    #[serde(rename = "route", default)]
    entries: Vec<XmlRoute>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlRoute {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@destination")]
    destination: String,
    #[serde(rename = "@dest_dir", default)]
    dest_dir: Option<String>,
    // Required by the build step; optional here so the error can name the route.
    #[serde(rename = "@condition", default)]
    condition: Option<String>,
    #[serde(rename = "@filter")]
    filter: String,
    #[serde(rename = "@pattern", default)]
    pattern: Option<String>,
    #[serde(rename = "@preserve_time", default)]
    preserve_time: Option<bool>,
    #[serde(rename = "@cleanup_on_error", default)]
    cleanup_on_error: Option<bool>,
}

// Custom deserializer that trims surrounding whitespace for optional usize
fn de_usize_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| s.trim().parse::<usize>().ok()))
}

/// Resolve the config file location.
/// Precedence: explicit argument, then SHUNT_CONFIG, then the platform default.
/// The boolean reports whether the location was explicitly chosen.
fn resolve_config_path(explicit: Option<&Path>) -> (Option<PathBuf>, bool) {
    if let Some(p) = explicit {
        return (Some(p.to_path_buf()), true);
    }
    if let Some(p) = env::var_os(CONFIG_ENV) {
        return (Some(PathBuf::from(p)), true);
    }
    (default_config_path(), false)
}

/// Read configuration from XML.
///
/// Returns `Ok(None)` when no config file exists at the default location (a
/// template is written there first, so users get a starting point). A missing
/// file at an explicitly chosen location is an error, as is any parse
/// failure or unknown field.
pub fn load_config(explicit: Option<&Path>) -> Result<Option<Config>> {
    let (cfg_path, explicit_location) = resolve_config_path(explicit);
    let Some(cfg_path) = cfg_path else {
        return Ok(None);
    };

    if !cfg_path.exists() {
        if explicit_location {
            bail!("config file not found: {}", cfg_path.display());
        }
        let _ = create_template_config(&cfg_path);
        return Ok(None);
    }

    let content = fs::read_to_string(&cfg_path)
        .with_context(|| format!("read config file '{}'", cfg_path.display()))?;
    let parsed: XmlConfig = from_xml_str(&content)
        .with_context(|| format!("parse config file '{}'", cfg_path.display()))?;

    let mut cfg = Config::default();
    if let Some(sb) = parsed.source_base.as_deref() {
        let trimmed = sb.trim();
        if !trimmed.is_empty() {
            cfg.source_base = PathBuf::from(trimmed);
        }
    }
    if let Some(lvl) = parsed
        .log_level
        .as_deref()
        .and_then(|s| LogLevel::parse(s.trim()))
    {
        cfg.log_level = lvl;
    }
    if let Some(lf) = parsed.log_file.as_deref() {
        let trimmed = lf.trim();
        if !trimmed.is_empty() {
            cfg.log_file = Some(PathBuf::from(trimmed));
        }
    }
    cfg.scan_depth = parsed.scan_depth.unwrap_or(SCAN_DEPTH_DEFAULT);

    cfg.destinations = parsed
        .destinations
        .map(|d| {
            d.entries
                .into_iter()
                .map(|e| DestinationConfig {
                    name: e.name.trim().to_string(),
                    path: PathBuf::from(e.path.trim()),
                })
                .collect()
        })
        .unwrap_or_default();

    cfg.routes = parsed
        .routes
        .map(|r| {
            r.entries
                .into_iter()
                .map(|e| RouteConfig {
                    name: e.name.trim().to_string(),
                    destination: e.destination.trim().to_string(),
                    dest_dir: PathBuf::from(e.dest_dir.as_deref().unwrap_or(".").trim()),
                    condition: e.condition.map(|c| c.trim().to_string()),
                    filter: FilterConfig {
                        kind: e.filter.trim().to_string(),
                        pattern: e.pattern,
                    },
                    preserve_time: e.preserve_time.unwrap_or(false),
                    cleanup_on_error: e.cleanup_on_error.unwrap_or(true),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(cfg))
}

/// Create parent directory and write a small secure template config file.
///
/// On Unix this will attempt to set conservative permissions:
///  - dir: 0o700
///  - file: 0o600
pub fn create_template_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(parent, fs::Permissions::from_mode(0o700));
        }
    }

    let content = format!(
        concat!(
            "<config>\n",
            "  <source_base>{}</source_base>\n",
            "  <log_level>normal</log_level>\n",
            "  <destinations>\n",
            "    <destination name=\"archive\" path=\"/mnt/files/archive\"/>\n",
            "  </destinations>\n",
            "  <routes>\n",
            "    <route name=\"everything\" destination=\"archive\" filter=\"any\" condition=\"not_exists\"/>\n",
            "  </routes>\n",
            "</config>\n",
        ),
        SOURCE_BASE_DEFAULT
    );

    fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }

    info!("Created template config at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
<config>
  <source_base>/data/incoming</source_base>
  <log_level>debug</log_level>
  <scan_depth> 2 </scan_depth>
  <destinations>
    <destination name="archive" path="/data/archive"/>
    <destination name="reports" path="/data/reports"/>
  </destinations>
  <routes>
    <route name="csv" destination="reports" dest_dir="csv" condition="not_exists"
           filter="extension" pattern="csv" preserve_time="true"/>
    <route name="rest" destination="archive" condition="always" filter="any"/>
  </routes>
</config>
"#;

    #[test]
    fn parses_full_sample() {
        let parsed: XmlConfig = from_xml_str(SAMPLE).unwrap();
        assert_eq!(parsed.source_base.as_deref(), Some("/data/incoming"));
        assert_eq!(parsed.scan_depth, Some(2));
        let dests = parsed.destinations.unwrap();
        assert_eq!(dests.entries.len(), 2);
        assert_eq!(dests.entries[0].name, "archive");
        let routes = parsed.routes.unwrap();
        assert_eq!(routes.entries.len(), 2);
        assert_eq!(routes.entries[0].condition.as_deref(), Some("not_exists"));
        assert_eq!(routes.entries[0].pattern.as_deref(), Some("csv"));
        assert_eq!(routes.entries[1].condition.as_deref(), Some("always"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let bad = "<config><surprise>1</surprise></config>";
        assert!(from_xml_str::<XmlConfig>(bad).is_err());
    }

    #[test]
    fn missing_condition_survives_parse() {
        // The parse keeps it as None; the build step turns that into an error
        // naming the route.
        let xml = r#"
<config>
  <routes>
    <route name="r" destination="d" filter="any"/>
  </routes>
</config>
"#;
        let parsed: XmlConfig = from_xml_str(xml).unwrap();
        assert!(parsed.routes.unwrap().entries[0].condition.is_none());
    }
}
