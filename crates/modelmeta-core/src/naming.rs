//! Naming normalizer: identifier → storage name, plus English inflection.
//!
//! `to_storage_name("UserProfile")` is `"user_profile"` and
//! `pluralize("user_profile")` is `"user_profiles"`. Everything here is pure;
//! the memo cache behind [`to_storage_name`] is invisible to callers.

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use regex::Regex;

/// Separator inserted between words of a storage name.
pub const SEPARATOR: char = '_';

/// Storage name of the conventional identity column.
pub const IDENTITY_COLUMN: &str = "id";

struct CaseRules {
    acronym_boundary: Regex,
    word_boundary: Regex,
    separators: Regex,
}

fn case_rules() -> &'static CaseRules {
    static RULES: OnceLock<CaseRules> = OnceLock::new();
    RULES.get_or_init(|| CaseRules {
        // "HTTPServer" -> "HTTP_Server"
        acronym_boundary: compile(r"([A-Z]+)([A-Z][a-z])"),
        // "userId" -> "user_Id", "utf8Name" -> "utf8_Name"
        word_boundary: compile(r"([a-z0-9])([A-Z])"),
        separators: compile(r"[^A-Za-z0-9]+"),
    })
}

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => unreachable!("built-in naming pattern {pattern:?} failed to compile: {e}"),
    }
}

/// Most names the process-wide memo keeps. Model and field identifiers fit
/// comfortably; free-form names looked up past the cap are normalized
/// without being stored.
const NAME_CACHE_LIMIT: usize = 4096;

/// Process-wide memo of normalized names.
struct NameCache {
    names: RwLock<HashMap<String, String>>,
    limit: usize,
}

impl NameCache {
    fn get_or_insert(&self, name: &str) -> String {
        {
            let names = self.names.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = names.get(name) {
                return cached.clone();
            }
        }

        let normalized = normalize(name);
        let mut names = self.names.write().unwrap_or_else(PoisonError::into_inner);
        if names.len() < self.limit {
            names.insert(name.to_string(), normalized.clone());
        }
        normalized
    }
}

fn name_cache() -> &'static NameCache {
    static CACHE: OnceLock<NameCache> = OnceLock::new();
    CACHE.get_or_init(|| NameCache {
        names: RwLock::new(HashMap::new()),
        limit: NAME_CACHE_LIMIT,
    })
}

/// Convert an identifier into its canonical storage name.
///
/// Splits on case transitions (keeping acronyms together), lower-cases, joins
/// with `_` and collapses runs of separators.
///
/// ```
/// use modelmeta_core::naming::to_storage_name;
///
/// assert_eq!(to_storage_name("UserProfile"), "user_profile");
/// assert_eq!(to_storage_name("UserID"), "user_id");
/// assert_eq!(to_storage_name("HTTPServer"), "http_server");
/// assert_eq!(to_storage_name("owner__type"), "owner_type");
/// ```
pub fn to_storage_name(name: &str) -> String {
    name_cache().get_or_insert(name)
}

fn normalize(name: &str) -> String {
    let rules = case_rules();
    let spaced = rules.separators.replace_all(name, "_");
    let spaced = rules.acronym_boundary.replace_all(&spaced, "${1}_${2}");
    let spaced = rules.word_boundary.replace_all(&spaced, "${1}_${2}");

    let mut out = String::with_capacity(spaced.len());
    for ch in spaced.chars() {
        if ch == SEPARATOR {
            if !out.is_empty() && !out.ends_with(SEPARATOR) {
                out.push(SEPARATOR);
            }
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    while out.ends_with(SEPARATOR) {
        out.pop();
    }
    out
}

/// Storage-name equality that ignores case and separators.
pub fn same_storage_name(a: &str, b: &str) -> bool {
    a == b || to_storage_name(a) == to_storage_name(b)
}

/// Conventional foreign-key name: `<owner><key>`, e.g. `("User", "id")` → `User_id`.
///
/// The result is meant to be compared with [`same_storage_name`], so
/// `user_id`, `UserId` and `UserID` all match it.
pub fn foreign_key_name(owner: &str, key: &str) -> String {
    format!("{owner}{SEPARATOR}{key}")
}

// ============================================================================
// Inflection
// ============================================================================

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "jeans",
    "police",
    "metadata",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("sex", "sexes"),
    ("move", "moves"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("goose", "geese"),
];

/// Suffix rules, most specific first.
const PLURAL_RULES: &[(&str, &str)] = &[
    (r"(quiz)$", "${1}zes"),
    (r"^(oxen)$", "${1}"),
    (r"^(ox)$", "${1}en"),
    (r"(m|l)ice$", "${1}ice"),
    (r"(m|l)ouse$", "${1}ice"),
    (r"(matr|vert|ind)(?:ix|ex)$", "${1}ices"),
    (r"(x|ch|ss|sh)$", "${1}es"),
    (r"([^aeiouy]|qu)y$", "${1}ies"),
    (r"(hive)$", "${1}s"),
    (r"(?:([^f])fe|([lr])f)$", "${1}${2}ves"),
    (r"sis$", "ses"),
    (r"([ti])a$", "${1}a"),
    (r"([ti])um$", "${1}a"),
    (r"(buffal|tomat)o$", "${1}oes"),
    (r"(bu)s$", "${1}ses"),
    (r"(alias|status)$", "${1}es"),
    (r"(octop|vir)i$", "${1}i"),
    (r"(octop|vir)us$", "${1}i"),
    (r"^(ax|test)is$", "${1}es"),
    (r"s$", "s"),
    (r"$", "s"),
];

const SINGULAR_RULES: &[(&str, &str)] = &[
    (r"(database)s$", "${1}"),
    (r"(quiz)zes$", "${1}"),
    (r"(matr)ices$", "${1}ix"),
    (r"(vert|ind)ices$", "${1}ex"),
    (r"^(ox)en", "${1}"),
    (r"(alias|status)(es)?$", "${1}"),
    (r"(octop|vir)(us|i)$", "${1}us"),
    (r"^(a)x[ie]s$", "${1}xis"),
    (r"(cris|test)(is|es)$", "${1}is"),
    (r"(shoe)s$", "${1}"),
    (r"(o)es$", "${1}"),
    (r"(bus)(es)?$", "${1}"),
    (r"^(m|l)ice$", "${1}ouse"),
    (r"(x|ch|ss|sh)es$", "${1}"),
    (r"(m)ovies$", "${1}ovie"),
    (r"(s)eries$", "${1}eries"),
    (r"([^aeiouy]|qu)ies$", "${1}y"),
    (r"([lr])ves$", "${1}f"),
    (r"(tive)s$", "${1}"),
    (r"(hive)s$", "${1}"),
    (r"([^f])ves$", "${1}fe"),
    (r"(^analy)(sis|ses)$", "${1}sis"),
    (
        r"((a)naly|(b)a|(d)iagno|(p)arenthe|(p)rogno|(s)ynop|(t)he)(sis|ses)$",
        "${1}sis",
    ),
    (r"([ti])a$", "${1}um"),
    (r"(n)ews$", "${1}ews"),
    (r"(ss)$", "${1}"),
    (r"s$", ""),
];

struct Inflections {
    plural: Vec<(Regex, &'static str)>,
    singular: Vec<(Regex, &'static str)>,
}

fn inflections() -> &'static Inflections {
    static INFLECTIONS: OnceLock<Inflections> = OnceLock::new();
    INFLECTIONS.get_or_init(|| {
        let build = |rules: &[(&str, &'static str)]| {
            rules
                .iter()
                .map(|(pattern, replacement)| (compile(&format!("(?i){pattern}")), *replacement))
                .collect()
        };
        Inflections {
            plural: build(PLURAL_RULES),
            singular: build(SINGULAR_RULES),
        }
    })
}

/// The last `_`-separated word of a storage name, with its byte offset.
fn last_word(name: &str) -> (usize, &str) {
    match name.rfind(SEPARATOR) {
        Some(idx) => (idx + 1, &name[idx + 1..]),
        None => (0, name),
    }
}

fn match_case(template: &str, word: &str) -> String {
    let mut chars = word.chars();
    match (template.chars().next(), chars.next()) {
        (Some(t), Some(first)) if t.is_uppercase() => {
            first.to_uppercase().chain(chars).collect()
        }
        _ => word.to_string(),
    }
}

fn inflect(
    name: &str,
    irregular: impl Fn(&str) -> Option<&'static str>,
    rules: &[(Regex, &'static str)],
) -> String {
    if name.is_empty() {
        return String::new();
    }

    let (offset, word) = last_word(name);
    let lower = word.to_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return name.to_string();
    }
    if let Some(replacement) = irregular(&lower) {
        return format!("{}{}", &name[..offset], match_case(word, replacement));
    }

    for (rule, replacement) in rules {
        if rule.is_match(name) {
            return rule.replace(name, *replacement).into_owned();
        }
    }
    name.to_string()
}

/// Plural form of a (storage-style) noun.
///
/// ```
/// use modelmeta_core::naming::pluralize;
///
/// assert_eq!(pluralize("user_profile"), "user_profiles");
/// assert_eq!(pluralize("person"), "people");
/// assert_eq!(pluralize("category"), "categories");
/// ```
pub fn pluralize(name: &str) -> String {
    inflect(
        name,
        |word| {
            IRREGULAR
                .iter()
                .find(|(singular, plural)| *singular == word || *plural == word)
                .map(|(_, plural)| *plural)
        },
        &inflections().plural,
    )
}

/// Singular form of a (storage-style) noun.
pub fn singularize(name: &str) -> String {
    inflect(
        name,
        |word| {
            IRREGULAR
                .iter()
                .find(|(singular, plural)| *singular == word || *plural == word)
                .map(|(singular, _)| *singular)
        },
        &inflections().singular,
    )
}

/// Default table name for a type: storage name, pluralized unless `singular`.
pub fn default_table_name(type_name: &str, singular: bool) -> String {
    let name = to_storage_name(type_name);
    if singular { name } else { pluralize(&name) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_cache_stops_growing_at_limit() {
        let cache = NameCache {
            names: RwLock::new(HashMap::new()),
            limit: 2,
        };
        assert_eq!(cache.get_or_insert("UserId"), "user_id");
        assert_eq!(cache.get_or_insert("TeamId"), "team_id");
        assert_eq!(cache.get_or_insert("OwnerType"), "owner_type");
        assert_eq!(cache.get_or_insert("OwnerType"), "owner_type");
        assert_eq!(cache.names.read().unwrap().len(), 2);
        assert_eq!(cache.get_or_insert("UserId"), "user_id");
    }

    #[test]
    fn test_storage_name_case_transitions() {
        assert_eq!(to_storage_name("User"), "user");
        assert_eq!(to_storage_name("UserProfile"), "user_profile");
        assert_eq!(to_storage_name("UserID"), "user_id");
        assert_eq!(to_storage_name("ID"), "id");
        assert_eq!(to_storage_name("HTTPServer"), "http_server");
        assert_eq!(to_storage_name("UTF8Name"), "utf8_name");
        assert_eq!(to_storage_name("userId"), "user_id");
    }

    #[test]
    fn test_storage_name_separators() {
        assert_eq!(to_storage_name("user_id"), "user_id");
        assert_eq!(to_storage_name("User__Id"), "user_id");
        assert_eq!(to_storage_name("_leading"), "leading");
        assert_eq!(to_storage_name("kebab-case name"), "kebab_case_name");
        assert_eq!(to_storage_name(""), "");
    }

    #[test]
    fn test_storage_name_is_deterministic() {
        let first = to_storage_name("CreditCardNumber");
        let second = to_storage_name("CreditCardNumber");
        assert_eq!(first, second);
        assert_eq!(first, "credit_card_number");
    }

    #[test]
    fn test_same_storage_name() {
        assert!(same_storage_name("UserId", "user_id"));
        assert!(same_storage_name("UserID", "user_id"));
        assert!(same_storage_name(&foreign_key_name("User", "id"), "user_id"));
        assert!(!same_storage_name("UserIds", "user_id"));
    }

    #[test]
    fn test_pluralize_rules() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("user_profile"), "user_profiles");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("wolf"), "wolves");
        assert_eq!(pluralize("knife"), "knives");
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(pluralize("matrix"), "matrices");
        assert_eq!(pluralize("key"), "keys");
    }

    #[test]
    fn test_pluralize_irregular_and_uncountable() {
        assert_eq!(pluralize("person"), "people");
        assert_eq!(pluralize("sales_person"), "sales_people");
        assert_eq!(pluralize("child"), "children");
        assert_eq!(pluralize("human"), "humans");
        assert_eq!(pluralize("sheep"), "sheep");
        assert_eq!(pluralize("user_equipment"), "user_equipment");
        assert_eq!(pluralize("people"), "people");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("people"), "person");
        assert_eq!(singularize("wolves"), "wolf");
        assert_eq!(singularize("statuses"), "status");
        assert_eq!(singularize("user_profiles"), "user_profile");
    }

    #[test]
    fn test_default_table_name() {
        assert_eq!(default_table_name("UserProfile", false), "user_profiles");
        assert_eq!(default_table_name("UserProfile", true), "user_profile");
        assert_eq!(default_table_name("Person", false), "people");
    }
}
