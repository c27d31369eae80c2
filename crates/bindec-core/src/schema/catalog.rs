//! The table of top-level definitions and the entry points for building
//! new definitions from schema documents.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::debug;

use super::builtin::base_types;
use super::FieldDef;
use crate::config::{json_type, Defaults};
use crate::error::{Error, Result};

/// Top-level definitions available as bases, plus the defaults they were
/// built with.
///
/// ```
/// use bindec_core::{Catalog, Defaults};
/// use serde_json::json;
///
/// let mut catalog = Catalog::new(Defaults::new())?;
/// let defs = json!({"u16": {"base": "uint", "size": 2}});
/// let mut fields = Vec::new();
/// catalog.create_fields("typedefs", "", true, defs.as_object().unwrap(), &mut fields)?;
/// assert_eq!(catalog.get("u16").and_then(|f| f.size()), Some(2));
/// # Ok::<(), bindec_core::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Catalog {
    defaults: Defaults,
    top_level: HashMap<String, FieldDef>,
}

impl Catalog {
    /// Creates a catalog holding the built-in kinds configured by `defaults`
    pub fn new(defaults: Defaults) -> Result<Self> {
        let mut catalog = Self {
            defaults,
            top_level: HashMap::new(),
        };
        for field in base_types(&catalog.defaults)? {
            catalog.register(field)?;
        }
        Ok(catalog)
    }

    /// Defaults the built-in kinds were created with
    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Looks up a top-level definition
    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.top_level.get(name)
    }

    /// Number of top-level definitions, built-ins included
    pub fn len(&self) -> usize {
        self.top_level.len()
    }

    /// True when no definitions are registered
    pub fn is_empty(&self) -> bool {
        self.top_level.is_empty()
    }

    /// Adds a top-level definition; names must be unique
    pub fn register(&mut self, field: FieldDef) -> Result<()> {
        if self.top_level.contains_key(&field.name) {
            return Err(Error::schema(
                "",
                field.name.as_str(),
                "top level field name duplication",
            ));
        }
        debug!("Registered top-level definition \"{}\"", field.name);
        self.top_level.insert(field.name.clone(), field);
        Ok(())
    }

    /// Derives a new definition named `name` from the base named by `spec["base"]`.
    ///
    /// The base is searched in `locals` first, then among top-level
    /// definitions. `parent_path` only qualifies error messages.
    pub fn derive(
        &self,
        name: &str,
        parent_path: &str,
        spec: &Map<String, Value>,
        locals: &[FieldDef],
    ) -> Result<FieldDef> {
        let base_name = base_name(parent_path, name, spec)?;
        let local = locals.iter().find(|f| f.name == base_name);
        self.derive_from(name, parent_path, spec, base_name, local)
    }

    pub(super) fn derive_from(
        &self,
        name: &str,
        parent_path: &str,
        spec: &Map<String, Value>,
        base_name: &str,
        local: Option<&FieldDef>,
    ) -> Result<FieldDef> {
        let base = local.or_else(|| self.top_level.get(base_name)).ok_or_else(|| {
            Error::schema(
                parent_path,
                name,
                format!("base field \"{}\" not found", base_name),
            )
        })?;
        self.clone_field(base, name, parent_path, spec)
    }

    /// Derives every entry of `defs` and appends it to `fields`.
    ///
    /// `name` and `parent_path` identify the structure being filled. With
    /// `register` set each new definition also becomes a top-level one.
    pub fn create_fields(
        &mut self,
        name: &str,
        parent_path: &str,
        register: bool,
        defs: &Map<String, Value>,
        fields: &mut Vec<FieldDef>,
    ) -> Result<()> {
        let path = join_path(parent_path, name);
        for (field_name, entry) in defs {
            let field = self.derive_entry(&path, field_name, entry, fields)?;
            fields.push(field.clone());
            if register {
                self.register(field)?;
            }
        }
        Ok(())
    }

    /// Non-registering variant of [`create_fields`](Self::create_fields)
    /// used for nested structures
    pub(crate) fn append_fields(
        &self,
        name: &str,
        parent_path: &str,
        defs: &Map<String, Value>,
        fields: &mut Vec<FieldDef>,
    ) -> Result<()> {
        let path = join_path(parent_path, name);
        for (field_name, entry) in defs {
            let field = self.derive_entry(&path, field_name, entry, fields)?;
            fields.push(field);
        }
        Ok(())
    }

    fn derive_entry(
        &self,
        path: &str,
        field_name: &str,
        entry: &Value,
        siblings: &[FieldDef],
    ) -> Result<FieldDef> {
        if siblings.iter().any(|f| f.name == field_name) {
            return Err(Error::schema(
                path,
                field_name,
                format!(
                    "structure field \"{}\" already exists and field redefinition is not allowed",
                    field_name
                ),
            ));
        }
        let spec = entry_spec(path, field_name, entry)?;
        self.derive(field_name, path, &spec, siblings)
    }
}

pub(super) fn join_path(parent_path: &str, name: &str) -> String {
    if parent_path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent_path, name)
    }
}

pub(super) fn base_name<'s>(
    parent_path: &str,
    name: &str,
    spec: &'s Map<String, Value>,
) -> Result<&'s str> {
    match spec.get("base") {
        None => Err(Error::schema(
            parent_path,
            name,
            "base field not specified (missing \"base\" key)",
        )),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(other) => Err(Error::schema(
            parent_path,
            name,
            format!(
                "base field name must be a non-blank string; got: {}",
                other
            ),
        )),
    }
}

/// Expands the shorthand forms of a schema entry.
///
/// A bare string names the base. A mapping with `fields` or `variants` but
/// no `base` descends from `struct` or `union`.
pub(super) fn entry_spec<'v>(
    parent_path: &str,
    name: &str,
    entry: &'v Value,
) -> Result<Cow<'v, Map<String, Value>>> {
    match entry {
        Value::String(base) => {
            let mut spec = Map::new();
            spec.insert("base".to_string(), Value::String(base.clone()));
            Ok(Cow::Owned(spec))
        }
        Value::Object(spec) if !spec.contains_key("base") => {
            let inferred = if spec.contains_key("fields") {
                "struct"
            } else if spec.contains_key("variants") {
                "union"
            } else {
                return Ok(Cow::Borrowed(spec));
            };
            let mut spec = spec.clone();
            spec.insert("base".to_string(), Value::String(inferred.to_string()));
            Ok(Cow::Owned(spec))
        }
        Value::Object(spec) => Ok(Cow::Borrowed(spec)),
        other => Err(Error::schema(
            parent_path,
            name,
            format!(
                "field definition must be a string or an object, got {}",
                json_type(other)
            ),
        )),
    }
}
