//! INI parsing: `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::MAX_INGEST_WORKERS;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::coord::MAX_TILE_RESOLUTION;
use crate::lod::MAX_LOD;

/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [batch] section
    if let Some(section) = ini.section(Some("batch")) {
        let s = Section::new("batch", section);
        if let Some(v) = s.number("window_ms", "expected milliseconds, e.g. 10")? {
            config.batch.window_ms = v;
        }
        if let Some(v) = s.positive("max_requests")? {
            config.batch.max_requests = v;
        }
        if let Some(v) = s.positive("request_timeout_secs")? {
            config.batch.request_timeout_secs = v as u64;
        }
        if let Some(v) = s.positive("queue_capacity")? {
            config.batch.queue_capacity = v;
        }
    }

    // [tiles] section
    if let Some(section) = ini.section(Some("tiles")) {
        let s = Section::new("tiles", section);
        if let Some(v) = s.number::<u32>("resolution", "expected a power of two up to 256")? {
            if v == 0 || v > MAX_TILE_RESOLUTION || !v.is_power_of_two() {
                return Err(s.invalid("resolution", &v.to_string(), "must be a power of two up to 256"));
            }
            config.tiles.resolution = v;
        }
        if let Some(v) = s.number::<usize>("lod", "expected a level count, 0 disables LOD")? {
            if v > MAX_LOD {
                return Err(s.invalid("lod", &v.to_string(), &format!("must be at most {}", MAX_LOD)));
            }
            config.tiles.lod = v;
        }
    }

    // [ingest] section
    if let Some(section) = ini.section(Some("ingest")) {
        let s = Section::new("ingest", section);
        if let Some(v) = s.positive("workers")? {
            config.ingest.workers = v.min(MAX_INGEST_WORKERS);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

/// Typed access to one section's keys with errors naming section and key.
struct Section<'a> {
    name: &'static str,
    props: &'a Properties,
}

impl<'a> Section<'a> {
    fn new(name: &'static str, props: &'a Properties) -> Self {
        Self { name, props }
    }

    fn invalid(&self, key: &str, value: &str, reason: &str) -> ConfigFileError {
        ConfigFileError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Parses `key` if present; empty values count as absent.
    fn number<T: FromStr>(&self, key: &str, reason: &str) -> Result<Option<T>, ConfigFileError> {
        match self.props.get(key).map(str::trim) {
            None | Some("") => Ok(None),
            Some(v) => v.parse().map(Some).map_err(|_| self.invalid(key, v, reason)),
        }
    }

    fn positive(&self, key: &str) -> Result<Option<usize>, ConfigFileError> {
        let reason = "must be a positive integer";
        match self.number::<usize>(key, reason)? {
            Some(0) => Err(self.invalid(key, "0", reason)),
            other => Ok(other),
        }
    }
}

/// Expands a leading `~` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = parse("[batch]\nwindow_ms = 25\n").unwrap();
        assert_eq!(config.batch.window_ms, 25);
        assert_eq!(config.batch.max_requests, ConfigFile::default().batch.max_requests);
        assert_eq!(config.tiles, ConfigFile::default().tiles);
    }

    #[test]
    fn test_all_sections() {
        let config = parse(
            "[batch]\nmax_requests = 64\nrequest_timeout_secs = 5\nqueue_capacity = 128\n\
             [tiles]\nresolution = 64\nlod = 4\n\
             [ingest]\nworkers = 3\n\
             [logging]\ndirectory = /var/log/tiles\nfile = run.log\n",
        )
        .unwrap();

        assert_eq!(config.batch.max_requests, 64);
        assert_eq!(config.batch.request_timeout_secs, 5);
        assert_eq!(config.batch.queue_capacity, 128);
        assert_eq!(config.tiles.resolution, 64);
        assert_eq!(config.tiles.lod, 4);
        assert_eq!(config.ingest.workers, 3);
        assert_eq!(config.logging.directory, PathBuf::from("/var/log/tiles"));
        assert_eq!(config.logging.file, "run.log");
    }

    #[test]
    fn test_invalid_number() {
        let err = parse("[batch]\nwindow_ms = soon\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, value, .. } => {
                assert_eq!(section, "batch");
                assert_eq!(key, "window_ms");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_rejected_where_positive_required() {
        assert!(parse("[batch]\nmax_requests = 0\n").is_err());
        assert!(parse("[ingest]\nworkers = 0\n").is_err());
        // a zero window dispatches immediately and is allowed
        assert_eq!(parse("[batch]\nwindow_ms = 0\n").unwrap().batch.window_ms, 0);
    }

    #[test]
    fn test_resolution_must_be_power_of_two() {
        assert!(parse("[tiles]\nresolution = 100\n").is_err());
        assert!(parse("[tiles]\nresolution = 512\n").is_err());
        assert_eq!(parse("[tiles]\nresolution = 1\n").unwrap().tiles.resolution, 1);
    }

    #[test]
    fn test_lod_bounded() {
        assert_eq!(parse("[tiles]\nlod = 33\n").unwrap().tiles.lod, MAX_LOD);
        assert!(parse("[tiles]\nlod = 34\n").is_err());
    }

    #[test]
    fn test_workers_clamped() {
        let config = parse("[ingest]\nworkers = 100000\n").unwrap();
        assert_eq!(config.ingest.workers, MAX_INGEST_WORKERS);
    }

    #[test]
    fn test_empty_values_ignored() {
        let config = parse("[batch]\nwindow_ms =\n[logging]\nfile =\n").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/logs"), home.join("logs"));
        }
    }
}
