//! Clone-and-override derivation of field definitions.
//!
//! Overrides are validated in layers: the keys every kind accepts, then the
//! scalar keys, then numeric ones, then what the concrete kind adds. A layer
//! only ever touches the clone, so the base stays as it was.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};
use tracing::trace;

use super::catalog::{base_name, entry_spec, join_path, Catalog};
use super::{
    CharDef, Count, Endian, FieldDef, FieldKind, NumericDef, Placement, Scalar, TimestampDef,
    Variant, RESERVED_NAMES,
};
use crate::codec::Codec;
use crate::config::parse_tzoffs;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::format::{NumberClass, NumberFormat, TimeFormat};

const COMMON_KEYS: &[&str] = &["base", "count"];
const SCALAR_KEYS: &[&str] = &["wrap_at", "separator", "size"];
const NUMERIC_KEYS: &[&str] = &["format", "endian"];
const TIMESTAMP_KEYS: &[&str] = &["tzoffs"];
const INTEGRAL_TIMESTAMP_KEYS: &[&str] = &["multiplier"];
const CHAR_KEYS: &[&str] = &["encoding", "length", "stop_on_zero"];
const STRUCT_KEYS: &[&str] = &["placement", "fields"];
const UNION_KEYS: &[&str] = &["variants"];
const VARIANT_KEYS: &[&str] = &["prefetch_size", "data_offset", "total_size", "trigger"];

const MAX_MULTIPLIER: u64 = 1_000_000_000_000;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_]\w*$").expect("identifier pattern is valid"))
}

fn allowed_keys(kind: &FieldKind) -> Vec<&'static str> {
    let layers: &[&[&str]] = match kind {
        FieldKind::Int(_) | FieldKind::UInt(_) | FieldKind::Float(_) => {
            &[COMMON_KEYS, SCALAR_KEYS, NUMERIC_KEYS]
        }
        FieldKind::Timestamp(_) => &[
            COMMON_KEYS,
            SCALAR_KEYS,
            NUMERIC_KEYS,
            TIMESTAMP_KEYS,
            INTEGRAL_TIMESTAMP_KEYS,
        ],
        FieldKind::FloatTimestamp(_) => &[COMMON_KEYS, SCALAR_KEYS, NUMERIC_KEYS, TIMESTAMP_KEYS],
        FieldKind::Char(_) => &[COMMON_KEYS, SCALAR_KEYS, CHAR_KEYS],
        FieldKind::Skip => &[COMMON_KEYS],
        FieldKind::Struct(_) => &[COMMON_KEYS, STRUCT_KEYS],
        FieldKind::Union(_) => &[COMMON_KEYS, UNION_KEYS],
    };
    layers.iter().flat_map(|keys| keys.iter().copied()).collect()
}

/// Reports problems against one field
struct Ctx<'a> {
    path: &'a str,
    name: &'a str,
}

impl Ctx<'_> {
    fn error(&self, message: impl Into<String>) -> Error {
        Error::schema(self.path, self.name, message)
    }

    fn positive(&self, spec: &Map<String, Value>, key: &str) -> Result<Option<u64>> {
        match spec.get(key) {
            None => Ok(None),
            Some(v) => match v.as_u64() {
                Some(n) if n >= 1 => Ok(Some(n)),
                _ => Err(self.error(format!(
                    "\"{}\" parameter is not a positive integer: {}",
                    key, v
                ))),
            },
        }
    }

    fn string<'s>(&self, spec: &'s Map<String, Value>, key: &str) -> Result<Option<&'s str>> {
        match spec.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(v) => Err(self.error(format!("\"{}\" parameter is not a string: {}", key, v))),
        }
    }

    /// A literal non-negative integer up to `max`, or an expression
    fn count(&self, key: &str, value: &Value, max: u64) -> Result<Count> {
        match value {
            Value::Number(n) => match n.as_u64() {
                Some(v) if v <= max => Ok(Count::Fixed(v)),
                _ => Err(self.error(format!(
                    "negative, fractional or too large \"{}\" parameter: {}. The maximum value is: {}",
                    key, n, max
                ))),
            },
            Value::String(text) => Expr::parse(text).map(Count::Dynamic).map_err(|e| {
                self.error(format!("cannot compile \"{}\" expression: {}", key, e))
            }),
            other => Err(self.error(format!(
                "invalid type of \"{}\" parameter; only unsigned integer or string are allowed, got: {}",
                key, other
            ))),
        }
    }
}

impl Catalog {
    /// Clones `base` under a new name and applies the overrides in `spec`
    pub(super) fn clone_field(
        &self,
        base: &FieldDef,
        name: &str,
        parent_path: &str,
        spec: &Map<String, Value>,
    ) -> Result<FieldDef> {
        let ctx = Ctx {
            path: parent_path,
            name,
        };
        validate_name(&ctx)?;

        let allowed = allowed_keys(&base.kind);
        let mut redundant: Vec<&str> = spec
            .keys()
            .map(String::as_str)
            .filter(|k| !allowed.contains(k))
            .collect();
        if !redundant.is_empty() {
            redundant.sort_unstable();
            return Err(ctx.error(format!(
                "unknown, redundant configuration keys: {}",
                redundant.join(", ")
            )));
        }

        let mut result = base.clone();
        result.name = name.to_string();
        if let Some(count) = spec.get("count") {
            result.count = ctx.count("count", count, self.defaults().limits.max_count)?;
        }

        if let Some(scalar) = result.kind.scalar_mut() {
            apply_scalar(&ctx, scalar, spec)?;
        }

        let max_integer_size = self.defaults().limits.max_integer_size;
        match &mut result.kind {
            FieldKind::Int(def) | FieldKind::UInt(def) => {
                apply_numeric(&ctx, def, spec, NumberClass::Integer)?;
                if def.scalar.size > max_integer_size {
                    return Err(ctx.error(format!(
                        "invalid value of \"size\" parameter: {}; integers of at most {} bytes are supported",
                        def.scalar.size, max_integer_size
                    )));
                }
            }
            FieldKind::Float(def) => {
                apply_numeric(&ctx, def, spec, NumberClass::Float)?;
                if !matches!(def.scalar.size, 4 | 8) {
                    return Err(ctx.error(format!(
                        "invalid value of \"size\" parameter: {}; only 4 and 8 values allowed for IEEE-754 float",
                        def.scalar.size
                    )));
                }
            }
            FieldKind::Timestamp(def) => {
                apply_timestamp(&ctx, def, spec)?;
                if let Some(m) = spec.get("multiplier") {
                    def.multiplier = match m.as_u64() {
                        Some(v) if (1..=MAX_MULTIPLIER).contains(&v) => v,
                        _ => {
                            return Err(ctx.error(format!(
                                "invalid value of \"multiplier\" parameter; required an integer in range [1..10^12]; got: {}",
                                m
                            )))
                        }
                    };
                }
                if def.scalar.size > max_integer_size {
                    return Err(ctx.error(format!(
                        "invalid value of \"size\" parameter: {}; integral timestamps of at most {} bytes are supported",
                        def.scalar.size, max_integer_size
                    )));
                }
            }
            FieldKind::FloatTimestamp(def) => {
                apply_timestamp(&ctx, def, spec)?;
                if def.scalar.size != 8 {
                    return Err(ctx.error(format!(
                        "invalid value of \"size\" parameter: {}; exactly 8 bytes required for float unix timestamp",
                        def.scalar.size
                    )));
                }
            }
            FieldKind::Char(def) => apply_char(&ctx, def, spec, self.defaults().limits.max_count)?,
            FieldKind::Skip => {}
            FieldKind::Struct(def) => {
                if let Some(text) = ctx.string(spec, "placement")? {
                    def.placement = Placement::parse(text).ok_or_else(|| {
                        ctx.error(format!("unknown placement strategy name: \"{}\"", text))
                    })?;
                }
                match spec.get("fields") {
                    None => {}
                    Some(Value::Object(defs)) => {
                        if !defs.is_empty() {
                            let fields = Arc::make_mut(&mut def.fields);
                            self.append_fields(name, parent_path, defs, fields)?;
                        }
                    }
                    Some(other) => {
                        return Err(ctx.error(format!(
                            "invalid structure fields specification; object expected, got: {}",
                            other
                        )))
                    }
                }
            }
            FieldKind::Union(def) => match spec.get("variants") {
                None => {}
                Some(Value::Object(defs)) => {
                    if !defs.is_empty() {
                        let variants = Arc::make_mut(&mut def.variants);
                        self.append_variants(name, parent_path, defs, variants)?;
                    }
                }
                Some(other) => {
                    return Err(ctx.error(format!(
                        "invalid union variants specification; object expected, got: {}",
                        other
                    )))
                }
            },
        }

        trace!(
            "Derived {} \"{}\" from \"{}\" in \"{}\"",
            result.kind.kind_name(),
            name,
            base.name,
            parent_path
        );
        Ok(result)
    }

    /// Derives the variants in `defs` and appends them to `variants`
    fn append_variants(
        &self,
        name: &str,
        parent_path: &str,
        defs: &Map<String, Value>,
        variants: &mut Vec<Variant>,
    ) -> Result<()> {
        let path = join_path(parent_path, name);
        let limits = &self.defaults().limits;

        for (variant_name, entry) in defs {
            let ctx = Ctx {
                path: &path,
                name: variant_name,
            };
            if variants.iter().any(|v| v.field.name == *variant_name) {
                return Err(ctx.error(format!(
                    "union variant \"{}\" already exists and variant redefinition is not allowed",
                    variant_name
                )));
            }

            let previous = variants.last();
            if let Some(prev) = previous.filter(|p| p.trigger.is_none()) {
                return Err(Error::schema(
                    &path,
                    prev.field.name.as_str(),
                    "union variant does not have trigger defined and it is not the last variant on the list",
                ));
            }

            let spec = entry_spec(&path, variant_name, entry)?;

            let prefetch_size = match spec.get("prefetch_size") {
                None => 0,
                Some(v) => match v.as_u64() {
                    Some(n) if n <= limits.max_prefetch_size as u64 => n as usize,
                    _ => {
                        return Err(ctx.error(format!(
                            "prefetch_size is not an integer in range [0..{}]; got: {}",
                            limits.max_prefetch_size, v
                        )))
                    }
                },
            };
            if let Some(prev) = previous.filter(|p| prefetch_size < p.prefetch_size) {
                return Err(ctx.error(format!(
                    "prefetch size ({}) for union variant is smaller than previous variant's prefetch size ({})",
                    prefetch_size, prev.prefetch_size
                )));
            }

            let data_offset = match spec.get("data_offset") {
                None => 0,
                Some(v) => match v.as_u64() {
                    Some(n) if n <= limits.max_data_offset => n,
                    _ => {
                        return Err(ctx.error(format!(
                            "data_offset is not an integer in range [0..{}]; got: {}",
                            limits.max_data_offset, v
                        )))
                    }
                },
            };

            let total_size = match spec.get("total_size") {
                None | Some(Value::Null) => None,
                Some(v) => match v.as_u64() {
                    Some(n) if n >= 1 => Some(n),
                    _ => {
                        return Err(ctx.error(format!(
                            "total_size is not a positive integer; got: {}",
                            v
                        )))
                    }
                },
            };
            if let Some(total) = total_size.filter(|t| data_offset >= *t) {
                return Err(ctx.error(format!(
                    "data_offset ({}) not less than total_size ({})",
                    data_offset, total
                )));
            }

            let trigger = match spec.get("trigger") {
                None | Some(Value::Null) => None,
                Some(Value::String(text)) => Some(Expr::parse(text).map_err(|e| {
                    ctx.error(format!("cannot compile the trigger: {}", e))
                })?),
                Some(other) => {
                    return Err(ctx.error(format!(
                        "trigger is not a string expression; got: {}",
                        other
                    )))
                }
            };

            let field_spec: Map<String, Value> = spec
                .iter()
                .filter(|(k, _)| !VARIANT_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let base = base_name(&path, variant_name, &field_spec)?;
            let local = variants
                .iter()
                .map(|v| &v.field)
                .find(|f| f.name == base);
            let field = self.derive_from(variant_name, &path, &field_spec, base, local)?;

            variants.push(Variant {
                field,
                prefetch_size,
                data_offset,
                total_size,
                trigger,
            });
        }
        Ok(())
    }
}

fn validate_name(ctx: &Ctx<'_>) -> Result<()> {
    if RESERVED_NAMES.contains(&ctx.name) {
        return Err(ctx.error(format!(
            "reserved word \"{}\" used as field name",
            ctx.name
        )));
    }
    if !name_pattern().is_match(ctx.name) {
        return Err(ctx.error(format!(
            "field name does not match required pattern: \"{}\"",
            name_pattern().as_str()
        )));
    }
    Ok(())
}

fn apply_scalar(ctx: &Ctx<'_>, scalar: &mut Scalar, spec: &Map<String, Value>) -> Result<()> {
    if let Some(wrap_at) = ctx.positive(spec, "wrap_at")? {
        scalar.wrap_at = wrap_at;
    }
    if let Some(separator) = ctx.string(spec, "separator")? {
        scalar.separator = separator.to_string();
    }
    if let Some(size) = ctx.positive(spec, "size")? {
        scalar.size = usize::try_from(size)
            .map_err(|_| ctx.error(format!("size parameter too large: {}", size)))?;
    }
    Ok(())
}

fn apply_endian(ctx: &Ctx<'_>, endian: &mut Endian, spec: &Map<String, Value>) -> Result<()> {
    if let Some(text) = ctx.string(spec, "endian")? {
        *endian = Endian::parse(text).ok_or_else(|| {
            ctx.error(format!("invalid endian (byte order) specifier: \"{}\"", text))
        })?;
    }
    Ok(())
}

fn apply_numeric(
    ctx: &Ctx<'_>,
    def: &mut NumericDef,
    spec: &Map<String, Value>,
    class: NumberClass,
) -> Result<()> {
    if let Some(text) = ctx.string(spec, "format")? {
        def.format = NumberFormat::parse(text, class).map_err(|e| ctx.error(e.to_string()))?;
    }
    apply_endian(ctx, &mut def.endian, spec)
}

fn apply_timestamp(ctx: &Ctx<'_>, def: &mut TimestampDef, spec: &Map<String, Value>) -> Result<()> {
    if let Some(text) = ctx.string(spec, "format")? {
        def.format = TimeFormat::parse(text).map_err(|e| ctx.error(e.to_string()))?;
    }
    apply_endian(ctx, &mut def.endian, spec)?;
    if let Some(value) = spec.get("tzoffs") {
        def.tzoffs = parse_tzoffs(value)
            .map_err(|msg| ctx.error(format!("invalid value of \"tzoffs\" parameter: {}", msg)))?;
    }
    if def.scalar.size < 4 {
        return Err(ctx.error(format!(
            "invalid value of \"size\" parameter: {}; at least 4 bytes required for unix timestamp",
            def.scalar.size
        )));
    }
    Ok(())
}

fn apply_char(ctx: &Ctx<'_>, def: &mut CharDef, spec: &Map<String, Value>, max: u64) -> Result<()> {
    if let Some(value) = spec.get("stop_on_zero") {
        def.stop_on_zero = value.as_bool().ok_or_else(|| {
            ctx.error(format!("stop_on_zero parameter is not a boolean: {}", value))
        })?;
    }
    if let Some(value) = spec.get("encoding") {
        let codec = value.as_str().and_then(Codec::lookup);
        def.encoding =
            codec.ok_or_else(|| ctx.error(format!("invalid encoding specifier: {}", value)))?;
    }
    if let Some(value) = spec.get("length") {
        def.length = Some(ctx.count("length", value, max)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Defaults;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::new(Defaults::new()).unwrap()
    }

    fn spec(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn derive(catalog: &Catalog, value: Value) -> Result<FieldDef> {
        catalog.derive("f", "main", &spec(value), &[])
    }

    fn typedefs(catalog: &mut Catalog, value: Value) -> Result<Vec<FieldDef>> {
        let mut fields = Vec::new();
        catalog.create_fields("user_typedefs", "", true, &spec(value), &mut fields)?;
        Ok(fields)
    }

    #[test]
    fn test_builtins_registered() {
        let catalog = catalog();
        for name in ["int", "uint", "ts", "fts", "float", "char", "skip", "struct", "union"] {
            assert!(catalog.get(name).is_some(), "{} missing", name);
        }
        assert_eq!(catalog.len(), 9);
        assert!(!catalog.is_empty());
    }

    #[test]
    fn test_derivation_keeps_base_unchanged() {
        let mut catalog = catalog();
        typedefs(
            &mut catalog,
            json!({
                "hdr": {"fields": {"a": "uint", "b": {"base": "int", "size": 2}}},
                "sel": {"variants": {"v1": {"base": "uint", "trigger": "1"}, "v2": "int"}}
            }),
        )
        .unwrap();
        let hdr = catalog.get("hdr").unwrap().clone();
        let sel = catalog.get("sel").unwrap().clone();

        for i in 0..3 {
            let name = format!("c{}", i);
            catalog
                .derive(&name, "main", &spec(json!({"base": "hdr", "fields": {"x": "uint"}, "count": 2})), &[])
                .unwrap();
            catalog
                .derive(&name, "main", &spec(json!({"base": "sel", "count": 3})), &[])
                .unwrap();
        }
        assert_eq!(catalog.get("hdr").unwrap(), &hdr);
        assert_eq!(catalog.get("sel").unwrap(), &sel);
        assert_eq!(hdr.fields().unwrap().len(), 2);
    }

    #[test]
    fn test_derived_struct_extends_base_fields() {
        let mut catalog = catalog();
        typedefs(&mut catalog, json!({"hdr": {"fields": {"a": "uint"}}})).unwrap();
        let f = derive(&catalog, json!({"base": "hdr", "fields": {"b": "a", "c": "int"}})).unwrap();
        let names: Vec<&str> = f.fields().unwrap().iter().map(FieldDef::name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        // "b" is derived from the sibling "a", a uint
        assert!(matches!(f.field("b").unwrap().kind(), FieldKind::UInt(_)));
    }

    #[test]
    fn test_name_validation() {
        let catalog = catalog();
        for good in ["a", "_x1", "Field_2", "zażółć"] {
            assert!(
                catalog.derive(good, "main", &spec(json!({"base": "uint"})), &[]).is_ok(),
                "{} rejected",
                good
            );
        }
        for bad in ["1a", "a-b", "a b", "", "uint", "struct", "DEFAULTS", "TYPEDEFS", "RAW", "and"] {
            let err = catalog
                .derive(bad, "main", &spec(json!({"base": "uint"})), &[])
                .unwrap_err();
            assert!(matches!(err, Error::Schema { .. }), "{} accepted", bad);
        }
    }

    #[test]
    fn test_redefinition_rejected() {
        let mut catalog = catalog();
        typedefs(&mut catalog, json!({"hdr": {"fields": {"a": "uint"}}})).unwrap();
        let err = derive(&catalog, json!({"base": "hdr", "fields": {"a": "uint"}})).unwrap_err();
        assert!(err.to_string().contains("redefinition is not allowed"));

        let err = typedefs(&mut catalog, json!({"hdr": "uint"})).unwrap_err();
        assert!(err.to_string().contains("duplication"));
    }

    #[test]
    fn test_shorthand_and_inferred_base() {
        let mut catalog = catalog();
        let fields = typedefs(
            &mut catalog,
            json!({
                "alias": "uint",
                "s": {"fields": {}},
                "u": {"variants": {}}
            }),
        )
        .unwrap();
        assert!(matches!(fields[0].kind(), FieldKind::UInt(_)));
        assert!(fields[1].is_structure());
        assert!(fields[2].is_union());

        let err = derive(&catalog, json!({"size": 2})).unwrap_err();
        assert!(err.to_string().contains("missing \"base\" key"));
        let err = derive(&catalog, json!({"base": "nothing"})).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_redundant_keys_rejected() {
        let catalog = catalog();
        assert!(derive(&catalog, json!({"base": "skip", "size": 2})).is_err());
        assert!(derive(&catalog, json!({"base": "uint", "multiplier": 2})).is_err());
        assert!(derive(&catalog, json!({"base": "fts", "multiplier": 2})).is_err());
        assert!(derive(&catalog, json!({"base": "struct", "variants": {}})).is_err());
        assert!(derive(&catalog, json!({"base": "ts", "multiplier": 1000})).is_ok());
    }

    #[test]
    fn test_scalar_validation() {
        let catalog = catalog();
        let invalid = [
            json!({"base": "uint", "size": 0}),
            json!({"base": "uint", "size": 17}),
            json!({"base": "uint", "wrap_at": 0}),
            json!({"base": "uint", "separator": 1}),
            json!({"base": "uint", "format": "{:.2d}"}),
            json!({"base": "uint", "endian": "middle"}),
            json!({"base": "uint", "count": -1}),
            json!({"base": "uint", "count": 1_099_511_627_777u64}),
            json!({"base": "uint", "count": "a +"}),
            json!({"base": "uint", "count": true}),
            json!({"base": "float", "size": 2}),
            json!({"base": "float", "format": "{:x}"}),
            json!({"base": "ts", "size": 3}),
            json!({"base": "ts", "tzoffs": 61}),
            json!({"base": "ts", "multiplier": 0}),
            json!({"base": "ts", "format": "%Q"}),
            json!({"base": "fts", "size": 4}),
            json!({"base": "char", "encoding": "UTF-33"}),
            json!({"base": "char", "stop_on_zero": 1}),
            json!({"base": "char", "length": -1}),
            json!({"base": "struct", "placement": "inline"}),
            json!({"base": "struct", "fields": []}),
        ];
        for value in invalid {
            let err = derive(&catalog, value.clone()).unwrap_err();
            assert!(matches!(err, Error::Schema { .. }), "{} accepted", value);
        }
    }

    #[test]
    fn test_count_and_length_forms() {
        let catalog = catalog();
        let f = derive(&catalog, json!({"base": "uint", "count": "n * 2"})).unwrap();
        assert!(matches!(f.count(), Count::Dynamic(_)));
        assert!(!f.is_trivially_one());

        let f = derive(&catalog, json!({"base": "char", "size": 16, "length": "len"})).unwrap();
        match f.kind() {
            FieldKind::Char(c) => assert!(matches!(c.length, Some(Count::Dynamic(_)))),
            other => panic!("unexpected kind {:?}", other),
        }

        let f = derive(&catalog, json!({"base": "uint", "count": 1})).unwrap();
        assert!(f.is_trivially_one());
    }

    #[test]
    fn test_schema_error_names_path() {
        let mut catalog = catalog();
        let err = typedefs(
            &mut catalog,
            json!({"outer": {"fields": {"inner": {"fields": {"bad": {"base": "uint", "size": 0}}}}}}),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "structure: \"user_typedefs.outer.inner\", field: \"bad\": \"size\" parameter is not a positive integer: 0"
        );
    }

    #[test]
    fn test_union_variant_rules() {
        let catalog = catalog();
        let missing_trigger = json!({"base": "union", "variants": {
            "v1": "uint", "v2": "int"
        }});
        let err = derive(&catalog, missing_trigger).unwrap_err();
        assert!(err.to_string().contains("field: \"v1\""));

        let decreasing = json!({"base": "union", "variants": {
            "v1": {"base": "uint", "prefetch_size": 2, "trigger": "RAW[0] == 1"},
            "v2": {"base": "uint", "prefetch_size": 1}
        }});
        assert!(derive(&catalog, decreasing).is_err());

        let bad_total = json!({"base": "union", "variants": {
            "v1": {"base": "uint", "data_offset": 4, "total_size": 4}
        }});
        assert!(derive(&catalog, bad_total).is_err());

        let too_far = json!({"base": "union", "variants": {
            "v1": {"base": "uint", "prefetch_size": 1025}
        }});
        assert!(derive(&catalog, too_far).is_err());

        let bad_trigger = json!({"base": "union", "variants": {
            "v1": {"base": "uint", "trigger": "RAW[0] = 1"}
        }});
        assert!(derive(&catalog, bad_trigger).is_err());

        let ok = json!({"base": "union", "variants": {
            "v1": {"base": "uint", "prefetch_size": 1, "trigger": "RAW[0] == 0x78"},
            "v2": {"base": "v1", "prefetch_size": 2, "data_offset": 1, "total_size": 8}
        }});
        let f = derive(&catalog, ok).unwrap();
        let variants = f.variants().unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[1].prefetch_size, 2);
        assert_eq!(variants[1].total_size, Some(8));
        assert!(variants[1].trigger.is_none());
    }

    #[test]
    fn test_derived_union_requires_trigger_on_inherited_last() {
        let mut catalog = catalog();
        typedefs(
            &mut catalog,
            json!({"sel": {"variants": {"v1": {"base": "uint", "trigger": "1"}, "v2": "int"}}}),
        )
        .unwrap();
        let err = derive(&catalog, json!({"base": "sel", "variants": {"v3": "uint"}})).unwrap_err();
        assert!(err.to_string().contains("field: \"v2\""));
    }

    #[test]
    fn test_limits_are_configurable() {
        let defaults = Defaults::new().limits(
            crate::config::SchemaLimits::new()
                .max_count(10)
                .max_prefetch_size(4),
        );
        let catalog = Catalog::new(defaults).unwrap();
        assert!(derive(&catalog, json!({"base": "uint", "count": 11})).is_err());
        let union = json!({"base": "union", "variants": {"v": {"base": "uint", "prefetch_size": 5}}});
        assert!(derive(&catalog, union).is_err());

        let limits = crate::config::SchemaLimits::new().max_integer_size(2);
        let catalog = Catalog::new(Defaults::new().limits(limits)).unwrap();
        assert!(derive(&catalog, json!({"base": "int", "size": 2})).is_ok());
        assert!(derive(&catalog, json!({"base": "uint", "size": 3})).is_err());
        assert!(derive(&catalog, json!({"base": "ts", "size": 3})).is_err());

        let wide = crate::config::SchemaLimits::new().max_integer_size(64);
        assert_eq!(wide.max_integer_size, crate::config::MAX_INTEGER_BYTES);
    }
}
