// Configuration file lookup.
//
// Settings come from INI-style `pyOlog.conf` files, read in a fixed order so
// that later files override earlier ones key by key:
//
//   /etc/pyOlog.conf, ~/pyOlog.conf, ~/.pyOlog.conf, ./pyOlog.conf
//
// Only the `[DEFAULT]` section is used. Other sections are read and ignored.
// Parsing follows the classic `ConfigParser` rules: the section name is
// case-sensitive, every key must sit under a section header, indented lines
// continue the previous value and ` ;` starts an inline comment.
//
//   [DEFAULT]
//   url = https://olog.example.org/Olog
//   username = swilkins
//   logbooks = Commissioning
//   tags = pyOlog

use crate::error::{OlogError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_URL: &str = "http://localhost:8181/Olog";
pub const CONFIG_FILE_NAME: &str = "pyOlog.conf";
const SECTION: &str = "DEFAULT";

/// Merged view of every config file found on the search path.
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: HashMap<String, String>,
    files: Vec<PathBuf>,
}

/// The standard search path, lowest precedence first.
pub fn search_path() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc").join(CONFIG_FILE_NAME)];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(CONFIG_FILE_NAME));
        paths.push(home.join(format!(".{CONFIG_FILE_NAME}")));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    paths
}

impl Config {
    /// Reads every file on the standard search path.
    pub fn load() -> Result<Self> {
        Config::load_from(search_path())
    }

    /// Reads the given files in order; missing files are skipped.
    pub fn load_from<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut config = Config::default();
        for path in paths {
            let path = path.as_ref();
            let text = match std::fs::read_to_string(path) {
                Ok(t) => t,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "config file not read");
                    continue;
                }
            };
            config.merge(path, &text)?;
            info!(path = %path.display(), "read config file");
            config.files.push(path.to_path_buf());
        }
        Ok(config)
    }

    /// Parses one file's text on top of the current values.
    pub fn merge(&mut self, path: &Path, text: &str) -> Result<()> {
        let error = |line: usize, detail: String| OlogError::Config {
            path: path.to_path_buf(),
            line,
            detail,
        };
        // `None` until the first section header.
        let mut in_default: Option<bool> = None;
        let mut last_key: Option<String> = None;
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || raw.starts_with(['#', ';']) || is_rem_comment(raw) {
                continue;
            }
            if raw.starts_with(char::is_whitespace) {
                let Some(key) = &last_key else {
                    return Err(error(i + 1, format!("unexpected indented line `{line}`")));
                };
                if in_default == Some(true) {
                    if let Some(value) = self.values.get_mut(key) {
                        value.push('\n');
                        value.push_str(strip_inline_comment(line));
                    }
                }
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or_else(|| error(i + 1, format!("unterminated section header `{line}`")))?;
                in_default = Some(name == SECTION);
                last_key = None;
                continue;
            }
            let Some(in_default) = in_default else {
                return Err(error(i + 1, format!("key outside any section: `{line}`")));
            };
            let Some(split) = line.find(['=', ':']) else {
                return Err(error(i + 1, format!("expected `key = value`, got `{line}`")));
            };
            let key = line[..split].trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(error(i + 1, format!("missing key in `{line}`")));
            }
            if in_default {
                let value = strip_inline_comment(line[split + 1..].trim());
                self.values.insert(key.clone(), value.to_string());
            }
            last_key = Some(key);
        }
        Ok(())
    }

    /// The explicit value when given, otherwise the configured one.
    pub fn value(&self, key: &str, explicit: Option<&str>) -> Option<String> {
        match explicit {
            Some(v) => Some(v.to_string()),
            None => self.get(key).map(str::to_string),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn url(&self) -> String {
        self.get("url").unwrap_or(DEFAULT_URL).to_string()
    }

    /// Comma separated list value, e.g. default logbooks.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)?.to_ascii_lowercase().as_str() {
            "1" | "yes" | "true" | "on" => Some(true),
            "0" | "no" | "false" | "off" => Some(false),
            _ => None,
        }
    }

    /// Files that were actually read, in order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_ascii_lowercase(), value.into());
    }
}

fn is_rem_comment(raw: &str) -> bool {
    raw.starts_with(['r', 'R'])
        && raw
            .split_whitespace()
            .next()
            .is_some_and(|word| word.eq_ignore_ascii_case("rem"))
}

// A `;` only opens a comment when whitespace precedes it.
fn strip_inline_comment(value: &str) -> &str {
    let cut = value
        .char_indices()
        .find(|&(i, c)| c == ';' && value[..i].ends_with(char::is_whitespace))
        .map(|(i, _)| i);
    match cut {
        Some(i) => value[..i].trim_end(),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, text).unwrap();
        p
    }

    #[test]
    fn later_files_override_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        let etc = write(dir.path(), "etc.conf", "[DEFAULT]\nurl=http://etc/Olog\nusername=root\n");
        let home = write(dir.path(), "home.conf", "[DEFAULT]\nusername = alice\n");
        let cfg = Config::load_from([etc, home]).unwrap();
        assert_eq!(cfg.url(), "http://etc/Olog");
        assert_eq!(cfg.get("username"), Some("alice"));
        assert_eq!(cfg.files().len(), 2);
    }

    #[test]
    fn only_cwd_file_sets_url() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = write(dir.path(), "pyOlog.conf", "[DEFAULT]\nurl=http://example.org/Olog\n");
        let paths = [
            dir.path().join("missing-etc.conf"),
            dir.path().join("missing-home.conf"),
            dir.path().join("missing-dot.conf"),
            cwd,
        ];
        let cfg = Config::load_from(paths).unwrap();
        assert_eq!(cfg.url(), "http://example.org/Olog");
    }

    #[test]
    fn default_url_when_nothing_configured() {
        let cfg = Config::load_from(Vec::<PathBuf>::new()).unwrap();
        assert_eq!(cfg.url(), DEFAULT_URL);
        assert_eq!(cfg.value("url", Some("http://x")), Some("http://x".into()));
        assert_eq!(cfg.value("username", None), None);
    }

    #[test]
    fn other_sections_comments_and_lists() {
        let mut cfg = Config::default();
        cfg.merge(
            Path::new("t.conf"),
            "; comment\n[DEFAULT]\nlogbooks = Ops, Controls ,\n[other]\nurl = http://ignored\n[DEFAULT]\nverify_ssl: no\n",
        )
        .unwrap();
        assert_eq!(cfg.list("logbooks"), vec!["Ops", "Controls"]);
        assert_eq!(cfg.get("url"), None);
        assert_eq!(cfg.flag("verify_ssl"), Some(false));
    }

    #[test]
    fn malformed_line_reports_position() {
        let mut cfg = Config::default();
        let err = cfg.merge(Path::new("bad.conf"), "[DEFAULT]\nno separator here\n").unwrap_err();
        assert!(err.to_string().contains("bad.conf:2"));
    }

    #[test]
    fn section_name_is_case_sensitive() {
        let mut cfg = Config::default();
        cfg.merge(Path::new("t.conf"), "[default]\nurl = http://lower/Olog\n").unwrap();
        assert_eq!(cfg.get("url"), None);
    }

    #[test]
    fn keys_before_any_section_are_rejected() {
        let mut cfg = Config::default();
        let err = cfg.merge(Path::new("t.conf"), "url = http://x/Olog\n[DEFAULT]\n").unwrap_err();
        assert!(err.to_string().contains("t.conf:1"));
    }

    #[test]
    fn indented_lines_continue_the_previous_value() {
        let mut cfg = Config::default();
        cfg.merge(Path::new("t.conf"), "[DEFAULT]\ntags = pyOlog,\n  Commissioning\nurl = http://x/Olog\n")
            .unwrap();
        assert_eq!(cfg.get("tags"), Some("pyOlog,\nCommissioning"));
        assert_eq!(cfg.get("url"), Some("http://x/Olog"));
    }

    #[test]
    fn inline_comments_need_leading_whitespace() {
        let mut cfg = Config::default();
        cfg.merge(
            Path::new("t.conf"),
            "[DEFAULT]\nusername = alice ; from the shift rota\npassword = a;b\nrem old entry\n",
        )
        .unwrap();
        assert_eq!(cfg.get("username"), Some("alice"));
        assert_eq!(cfg.get("password"), Some("a;b"));
    }
}
