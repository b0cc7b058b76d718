use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

use crate::search::MatchMode;

const CONFIG_FILE_NAME: &str = "config.toml";
const DATABASE_FILE_NAME: &str = "contacts.db";
const APP_NAME: &str = "tagbook";
const DEFAULT_SUGGESTION_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub database: PathBuf,
    pub order: ContactOrder,
    pub search: SearchConfig,
    pub suggestions: SuggestionsConfig,
}

/// How the enumerated contact list is ordered in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContactOrder {
    /// Most recently created first
    #[default]
    NewestFirst,
    /// Whatever order the store returns
    Store,
}

impl ContactOrder {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest_first" => Some(ContactOrder::NewestFirst),
            "store" => Some(ContactOrder::Store),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    pub mode: MatchMode,
    /// Fold accented and non-Latin text to ASCII before matching (include
    /// mode only)
    pub fold: bool,
}

#[derive(Debug, Clone)]
pub struct SuggestionsConfig {
    /// Max labels listed by `tagbook suggest` / `tagbook labels`
    pub limit: usize,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database: Option<PathBuf>,
    order: Option<String>,
    search: SearchFile,
    suggestions: SuggestionsFile,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SearchFile {
    mode: Option<String>,
    fold: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SuggestionsFile {
    limit: usize,
}

impl Default for SuggestionsFile {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

fn data_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine data directories")?;
    Ok(base.data_dir().join(APP_NAME))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load the configuration. A missing file yields the defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => expand_tilde(path),
        None => default_config_path()?,
    };

    if !path.exists() {
        return from_file(path, ConfigFile::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
    let value: toml::Value = toml::from_str(&raw)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))?;

    from_file(path, cfg_file)
}

fn from_file(config_path: PathBuf, file: ConfigFile) -> Result<Config> {
    let database = match file.database {
        Some(path) => expand_tilde(&path),
        None => data_root()?.join(DATABASE_FILE_NAME),
    };

    let order = match file.order.as_deref() {
        None => ContactOrder::default(),
        Some(raw) => ContactOrder::from_str(raw).with_context(|| {
            format!("invalid order '{}', expected one of: newest_first, store", raw)
        })?,
    };

    let mode = match file.search.mode.as_deref() {
        None => MatchMode::default(),
        Some(raw) => MatchMode::from_str(raw).with_context(|| {
            format!("invalid search.mode '{}', expected one of: include, exclude", raw)
        })?,
    };

    if file.suggestions.limit == 0 {
        bail!("suggestions.limit must be at least 1");
    }

    Ok(Config {
        config_path,
        database,
        order,
        search: SearchConfig {
            mode,
            fold: file.search.fold,
        },
        suggestions: SuggestionsConfig {
            limit: file.suggestions.limit,
        },
    })
}

/// Default file contents written by `tagbook init`.
pub fn default_config_toml(database: &Path) -> String {
    format!(
        r#"# tagbook configuration

database = "{}"

# newest_first | store
order = "newest_first"

[search]
# include: keep contacts containing every word
# exclude: keep contacts containing none of the words
mode = "include"
# fold accented and non-Latin text to ASCII (include mode only)
fold = false

[suggestions]
limit = {}
"#,
        database.display(),
        DEFAULT_SUGGESTION_LIMIT
    )
}

/// Write a default config at `path`, refusing to overwrite.
pub fn init(path: &Path, database: Option<&Path>) -> Result<PathBuf> {
    let path = expand_tilde(path);
    if path.exists() {
        bail!("configuration file already exists at {}", path.display());
    }
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create config dir: {}", dir.display()))?;
        }
    }
    let database = match database {
        Some(db) => expand_tilde(db),
        None => data_root()?.join(DATABASE_FILE_NAME),
    };
    fs::write(&path, default_config_toml(&database))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    let known = HashSet::from(["database", "order", "search", "suggestions"]);
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            eprintln!("warning: unknown configuration key `{}`", key);
        }
    }

    if let Some(search) = table.get("search") {
        warn_unknown_in_section(search, "search", &["mode", "fold"]);
    }
    if let Some(suggestions) = table.get("suggestions") {
        warn_unknown_in_section(suggestions, "suggestions", &["limit"]);
    }
}

fn warn_unknown_in_section(value: &toml::Value, section: &str, known: &[&str]) {
    let Some(table) = value.as_table() else {
        return;
    };
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            eprintln!("warning: unknown {}.* entry `{}`", section, key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.order, ContactOrder::NewestFirst);
        assert_eq!(config.search.mode, MatchMode::Include);
        assert!(!config.search.fold);
        assert_eq!(config.suggestions.limit, DEFAULT_SUGGESTION_LIMIT);
        assert!(config.database.ends_with(DATABASE_FILE_NAME));
    }

    #[test]
    fn test_reads_all_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let db = dir.path().join("db.sqlite");
        fs::write(
            &path,
            format!(
                "database = \"{}\"\norder = \"store\"\n[search]\nmode = \"EXCLUDE\"\nfold = true\n[suggestions]\nlimit = 3\n",
                db.display()
            ),
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.config_path, path);
        assert_eq!(config.database, db);
        assert_eq!(config.order, ContactOrder::Store);
        assert_eq!(config.search.mode, MatchMode::Exclude);
        assert!(config.search.fold);
        assert_eq!(config.suggestions.limit, 3);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        fs::write(&path, "[search]\nmode = \"fuzzy\"\n").unwrap();
        let err = load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("search.mode"));

        fs::write(&path, "order = \"alphabetical\"\n").unwrap();
        assert!(load(Some(&path)).is_err());

        fs::write(&path, "[suggestions]\nlimit = 0\n").unwrap();
        assert!(load(Some(&path)).is_err());
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("config.toml");
        let db = dir.path().join("contacts.db");

        let written = init(&path, Some(&db)).unwrap();
        assert_eq!(written, path);
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.database, db);
        assert_eq!(config.search.mode, MatchMode::Include);

        assert!(init(&path, Some(&db)).is_err());
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde(Path::new("/tmp/x")), PathBuf::from("/tmp/x"));
    }
}
