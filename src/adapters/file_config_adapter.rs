//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn section_keys(&self, section: &str) -> Vec<String> {
        // configparser lowercases section and key names
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[data]
path = /data/ES_5m.csv
symbol = ES

[simulation]
max_hold_bars = 24
same_bar_tie_break = stop_first
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("/data/ES_5m.csv".to_string())
        );
        assert_eq!(
            adapter.get_string("simulation", "same_bar_tie_break"),
            Some("stop_first".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[data]\nsymbol = ES\n").unwrap();
        assert_eq!(adapter.get_string("data", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn numeric_getters_fall_back_to_default() {
        let adapter = FileConfigAdapter::from_string(
            "[indicators]\natr = 14\nema_long = abc\nbollinger_k = 2.5\nvwap_k = wide\n",
        )
        .unwrap();
        assert_eq!(adapter.get_int("indicators", "atr", 0), 14);
        assert_eq!(adapter.get_int("indicators", "ema_long", 50), 50);
        assert_eq!(adapter.get_int("indicators", "missing", 42), 42);
        assert_eq!(adapter.get_double("indicators", "bollinger_k", 0.0), 2.5);
        assert_eq!(adapter.get_double("indicators", "vwap_k", 2.0), 2.0);
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[scan]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("scan", "a", false));
        assert!(adapter.get_bool("scan", "b", false));
        assert!(adapter.get_bool("scan", "c", false));
        assert!(!adapter.get_bool("scan", "d", true));
        assert!(!adapter.get_bool("scan", "e", true));
        assert!(!adapter.get_bool("scan", "f", true));
        assert!(adapter.get_bool("scan", "missing", true));
    }

    #[test]
    fn section_keys_are_sorted_and_lowercased() {
        let adapter = FileConfigAdapter::from_string(
            "[Grid]\ntarget_atr_mult = 2, 3\nStop_ATR_Mult = 1, 1.5\n",
        )
        .unwrap();
        assert_eq!(
            adapter.section_keys("grid"),
            vec!["stop_atr_mult".to_string(), "target_atr_mult".to_string()]
        );
        assert!(adapter.section_keys("absent").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[sqlite]\npath = /tmp/edgefinder.db\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("/tmp/edgefinder.db".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(result.is_err());
    }
}
