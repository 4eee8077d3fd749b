//! Field annotation mini-language.
//!
//! Annotations are `;`-separated `key[:value]` segments, e.g.
//! `"column:uid;primary_key"`. [`parse_tag_settings`] turns one string into a
//! key map; [`FieldSettings`] interprets the keys this crate understands into
//! a typed record, once per field.

use std::collections::HashMap;

use serde::Serialize;

/// Key → value map produced by [`parse_tag_settings`]. Keys are upper-case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagSettings(HashMap<String, String>);

impl TagSettings {
    /// Value for `key` (upper-case).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no keys were parsed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all key/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Insert every pair of `other`, overwriting existing keys.
    pub fn merge(&mut self, other: TagSettings) {
        self.0.extend(other.0);
    }
}

/// Parse an annotation string into a [`TagSettings`] map.
///
/// Each segment is split on its first `:`. The key is trimmed and
/// upper-cased. A segment without `:` maps its key to itself. Later duplicates
/// win. Empty segments are skipped.
///
/// ```
/// use modelmeta_core::tags::parse_tag_settings;
///
/// let tags = parse_tag_settings("type:varchar(255);not null");
/// assert_eq!(tags.get("TYPE"), Some("varchar(255)"));
/// assert_eq!(tags.get("NOT NULL"), Some("NOT NULL"));
/// ```
pub fn parse_tag_settings(raw: &str) -> TagSettings {
    let mut settings = HashMap::new();
    for segment in raw.split(';') {
        let (key, value) = match segment.split_once(':') {
            Some((key, value)) => {
                let key = key.trim().to_uppercase();
                (key, value.to_string())
            }
            None => {
                let key = segment.trim().to_uppercase();
                let value = key.clone();
                (key, value)
            }
        };
        if key.is_empty() {
            continue;
        }
        settings.insert(key, value);
    }
    TagSettings(settings)
}

/// Typed interpretation of a field's annotations.
///
/// Built from the model annotation (identity and relationship keys) and the
/// storage annotation (column definition keys). Keys from the model
/// annotation win when both define one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldSettings {
    /// `COLUMN`: explicit storage name.
    pub column: Option<String>,
    /// `PRIMARY_KEY`.
    pub primary_key: bool,
    /// `FOREIGNKEY`: comma-separated field names.
    pub foreign_keys: Vec<String>,
    /// `ASSOCIATIONFOREIGNKEY`: comma-separated field names on the related side.
    pub association_foreign_keys: Vec<String>,
    /// `MANY2MANY`: join table name.
    pub many2many: Option<String>,
    /// `POLYMORPHIC`: discriminator prefix.
    pub polymorphic: Option<String>,
    /// `EMBEDDED`.
    pub embedded: bool,
    /// `EMBEDDED_PREFIX`: prefix for promoted column names.
    pub embedded_prefix: Option<String>,
    /// `TYPE`: explicit storage type.
    pub sql_type: Option<String>,
    /// `SIZE`.
    pub size: Option<u32>,
    /// `NOT NULL`.
    pub not_null: bool,
    /// `UNIQUE`.
    pub unique: bool,
    /// `DEFAULT`: default value expression.
    pub default: Option<String>,
    /// `AUTO_INCREMENT`.
    pub auto_increment: bool,
    /// `INDEX`: index name, or the key itself when bare.
    pub index: Option<String>,
    /// `UNIQUE_INDEX`: index name, or the key itself when bare.
    pub unique_index: Option<String>,
    /// `-`: exclude the field entirely.
    pub ignored: bool,
    /// Every parsed key, merged.
    pub raw: TagSettings,
}

impl FieldSettings {
    /// Interpret a model annotation and a storage annotation.
    pub fn parse(model_tag: &str, sql_tag: &str) -> Self {
        let mut raw = parse_tag_settings(sql_tag);
        raw.merge(parse_tag_settings(model_tag));

        let text = |key: &str| {
            raw.get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let list = |key: &str| {
            raw.get(key)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            column: text("COLUMN"),
            primary_key: raw.contains("PRIMARY_KEY"),
            foreign_keys: list("FOREIGNKEY"),
            association_foreign_keys: list("ASSOCIATIONFOREIGNKEY"),
            many2many: text("MANY2MANY"),
            polymorphic: text("POLYMORPHIC"),
            embedded: raw.contains("EMBEDDED"),
            embedded_prefix: raw.get("EMBEDDED_PREFIX").map(str::to_string),
            sql_type: text("TYPE"),
            size: raw.get("SIZE").and_then(|v| v.trim().parse().ok()),
            not_null: raw.contains("NOT NULL"),
            unique: raw.contains("UNIQUE"),
            default: raw.get("DEFAULT").map(str::to_string),
            auto_increment: raw.contains("AUTO_INCREMENT"),
            index: text("INDEX"),
            unique_index: text("UNIQUE_INDEX"),
            ignored: sql_tag.trim() == "-" || model_tag.trim() == "-",
            raw,
        }
    }

    /// Whether a `DEFAULT` was declared.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}
