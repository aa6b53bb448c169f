//! Field annotation parser
//!
//! A field annotation is a comma separated list of directives:
//!
//! - `-` excludes the field from encoding and decoding
//! - `option` lets decoding skip the field when the table has no value
//! - `name=<ident>` sets the script-side name (default: the field name)
//!
//! Directive keys are case-insensitive and empty segments are ignored.
//! Parsed tags are cached per host type for the life of the process.

use std::any::TypeId;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::ConfigError;

/// Parsed annotation of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTag {
    /// Rust field identifier
    pub field: String,
    /// Script-side name
    pub name: String,
    /// Excluded from encode and decode
    pub skip: bool,
    /// Missing values are tolerated on decode
    pub optional: bool,
}

impl FieldTag {
    /// Parse the raw annotation of `field`
    pub fn parse(field: &str, raw: &str) -> Result<FieldTag, ConfigError> {
        let mut tag = FieldTag {
            field: field.to_string(),
            name: field.to_string(),
            skip: false,
            optional: false,
        };

        for directive in raw.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            let (key, value) = match directive.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (directive, None),
            };
            match (key.to_ascii_lowercase().as_str(), value) {
                ("-", None) => tag.skip = true,
                ("option", None) => tag.optional = true,
                ("name", Some(name)) if !name.is_empty() => tag.name = name.to_string(),
                _ => {
                    return Err(ConfigError::UnknownDirective {
                        field: field.to_string(),
                        directive: directive.to_string(),
                    })
                }
            }
        }

        Ok(tag)
    }
}

static TAG_CACHE: Lazy<RwLock<FxHashMap<TypeId, Arc<[FieldTag]>>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));

/// Process-wide cache of parsed field tags
pub struct FieldTags;

impl FieldTags {
    /// Tags of `T`, parsed from `(field, raw annotation)` pairs on first use.
    ///
    /// # Panics
    ///
    /// Panics with the [`ConfigError`] if an annotation is malformed.
    pub fn of<T: 'static>(raw: &[(&'static str, &'static str)]) -> Arc<[FieldTag]> {
        let id = TypeId::of::<T>();
        if let Some(tags) = TAG_CACHE.read().get(&id) {
            return tags.clone();
        }

        let parsed = raw
            .iter()
            .map(|(field, raw)| FieldTag::parse(field, raw))
            .collect::<Result<Arc<[FieldTag]>, ConfigError>>()
            .unwrap_or_else(|e| panic!("{}: {}", std::any::type_name::<T>(), e));

        TAG_CACHE.write().entry(id).or_insert(parsed).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let tag = FieldTag::parse("name", "").unwrap();
        assert_eq!(tag.name, "name");
        assert!(!tag.skip);
        assert!(!tag.optional);
    }

    #[test]
    fn test_parse_directives() {
        let tag = FieldTag::parse("port", " Option , name=listen_port,").unwrap();
        assert!(tag.optional);
        assert_eq!(tag.name, "listen_port");
        assert_eq!(tag.field, "port");

        assert!(FieldTag::parse("cache", "-").unwrap().skip);
    }

    #[test]
    fn test_unknown_directive() {
        assert_eq!(
            FieldTag::parse("x", "option,required"),
            Err(ConfigError::UnknownDirective {
                field: "x".to_string(),
                directive: "required".to_string(),
            })
        );
        assert!(FieldTag::parse("x", "name=").is_err());
        assert!(FieldTag::parse("x", "option=yes").is_err());
    }

    #[test]
    fn test_cache_is_per_type() {
        struct A;
        struct B;
        let a = FieldTags::of::<A>(&[("x", "option")]);
        let again = FieldTags::of::<A>(&[("x", "")]);
        let b = FieldTags::of::<B>(&[("x", "")]);
        assert!(Arc::ptr_eq(&a, &again));
        assert!(a[0].optional);
        assert!(!b[0].optional);
    }

    #[test]
    #[should_panic(expected = "unknown tag directive `bogus` on field `y`")]
    fn test_cache_panics_on_bad_tag() {
        struct Bad;
        FieldTags::of::<Bad>(&[("y", "bogus")]);
    }
}
