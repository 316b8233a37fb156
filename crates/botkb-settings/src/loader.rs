//! Settings loading: defaults, then the user file, then `BOTKB_*` variables.
//!
//! The user file is merged over the serialized defaults as JSON before it is
//! deserialized, so a file only needs the keys it changes. Merging recurses
//! into objects and lets arrays and scalars replace wholesale. A `null`
//! leaves the default in place.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{BotkbSettings, MetricSetting, OnCorruptSetting};

/// `~/.botkb/settings.json`, or under `/tmp` when `HOME` is unset.
pub fn settings_path() -> PathBuf {
    let home = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
    home.join(".botkb").join("settings.json")
}

/// Load settings from [`settings_path`] with env var overrides.
pub fn load_settings() -> Result<BotkbSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`, apply env var overrides, then validate.
///
/// A missing file is not an error; the defaults are used instead.
pub fn load_settings_from_path(path: &Path) -> Result<BotkbSettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_layered(path: &Path) -> Result<BotkbSettings> {
    let mut layered = serde_json::to_value(BotkbSettings::default())?;

    if path.exists() {
        debug!(path = %path.display(), "reading settings file");
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        layered = deep_merge(layered, user);
    } else {
        debug!(path = %path.display(), "no settings file, using defaults");
    }

    Ok(serde_json::from_value(layered)?)
}

/// Overlay `source` onto `target`.
///
/// Objects merge key by key and `null` keeps the target's value. Anything
/// else in `source` replaces what it lands on.
pub fn deep_merge(target: Value, source: Value) -> Value {
    let Value::Object(overlay) = source else {
        return source;
    };
    let Value::Object(mut base) = target else {
        return Value::Object(overlay);
    };
    for (key, value) in overlay {
        if value.is_null() {
            continue;
        }
        let merged = match base.remove(&key) {
            Some(existing) => deep_merge(existing, value),
            None => value,
        };
        let _ = base.insert(key, merged);
    }
    Value::Object(base)
}

/// Apply `BOTKB_*` environment variables over loaded settings.
///
/// Values that fail to parse, or fall outside the accepted range, are
/// logged and ignored so the file or default value stays in effect.
/// `BOTKB_TOP_K` is bounded by the loaded `retrieval.maxTopK`.
pub fn apply_env_overrides(settings: &mut BotkbSettings) {
    apply_overrides_from(settings, |name| env::var(name).ok());
}

fn apply_overrides_from(settings: &mut BotkbSettings, lookup: impl Fn(&str) -> Option<String>) {
    let embedding = &mut settings.embedding;
    override_with(&mut embedding.base_url, "BOTKB_EMBEDDING_URL", &lookup, non_empty);
    override_with(&mut embedding.model, "BOTKB_EMBEDDING_MODEL", &lookup, non_empty);
    override_with(&mut embedding.timeout_ms, "BOTKB_EMBEDDING_TIMEOUT_MS", &lookup, |v| {
        parse_in_range(v, 100, 600_000)
    });
    override_with(&mut embedding.batch_size, "BOTKB_EMBEDDING_BATCH_SIZE", &lookup, |v| {
        parse_in_range(v, 1, 4096)
    });

    let index = &mut settings.index;
    override_with(&mut index.data_dir, "BOTKB_DATA_DIR", &lookup, non_empty);
    override_with(&mut index.metric, "BOTKB_METRIC", &lookup, parse_enum::<MetricSetting>);
    override_with(&mut index.on_corrupt, "BOTKB_ON_CORRUPT", &lookup, parse_enum::<OnCorruptSetting>);

    let max_top_k = settings.retrieval.max_top_k;
    override_with(&mut settings.retrieval.top_k, "BOTKB_TOP_K", &lookup, |v| {
        parse_in_range(v, 1, max_top_k)
    });

    override_with(&mut settings.logging.level, "BOTKB_LOG_LEVEL", &lookup, non_empty);
    override_with(&mut settings.logging.json, "BOTKB_LOG_JSON", &lookup, parse_bool);
}

fn override_with<T>(
    slot: &mut T,
    name: &str,
    lookup: impl Fn(&str) -> Option<String>,
    parse: impl FnOnce(&str) -> Option<T>,
) {
    let Some(raw) = lookup(name) else {
        return;
    };
    match parse(&raw) {
        Some(value) => *slot = value,
        None => warn!(key = name, value = %raw, "ignoring unusable env var"),
    }
}

// ── Value parsers ───────────────────────────────────────────────────────────

fn non_empty(val: &str) -> Option<String> {
    (!val.is_empty()).then(|| val.to_string())
}

/// Parse a flag. Accepts `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`
/// in any case, with surrounding whitespace ignored.
pub fn parse_bool(val: &str) -> Option<bool> {
    const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
    const FALSY: [&str; 4] = ["false", "0", "no", "off"];
    let val = val.trim().to_ascii_lowercase();
    if TRUTHY.contains(&val.as_str()) {
        Some(true)
    } else if FALSY.contains(&val.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Parse an integer and keep it only if it lies in `min..=max`.
pub fn parse_in_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    val.trim()
        .parse()
        .ok()
        .filter(|n| (min..=max).contains(n))
}

/// Parse a settings enum from its JSON wire name (`l2`, `innerProduct`, ...).
pub fn parse_enum<T: DeserializeOwned>(val: &str) -> Option<T> {
    serde_json::from_value(Value::String(val.to_string())).ok()
}
