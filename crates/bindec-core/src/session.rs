//! Schema building for one run.
//!
//! A [`Session`] combines a config document and an optional format
//! document into a [`Catalog`] and selects the root structure to decode.
//! The order matters: `DEFAULTS` from the config are applied before those
//! of the format, the built-in kinds are created afterwards, then config
//! typedefs and format typedefs are registered in that order.

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{json_type, Defaults, DEFAULTS_KEY, TYPEDEFS_KEY};
use crate::error::{Error, Result};
use crate::schema::{Catalog, FieldDef};

const DEFAULT_TYPEDEFS: &str = "default_typedefs";
const USER_TYPEDEFS: &str = "user_typedefs";
const DEFAULT_DATASET: &str = "default_dataset";

/// Options for building a [`Session`]
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Starting defaults, before any `DEFAULTS` section is applied
    pub defaults: Defaults,
    /// Register the `TYPEDEFS` of the config document
    pub load_config_typedefs: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            defaults: Defaults::new(),
            load_config_typedefs: true,
        }
    }
}

impl SessionConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the starting defaults
    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Set whether config typedefs are registered
    pub fn load_config_typedefs(mut self, load: bool) -> Self {
        self.load_config_typedefs = load;
        self
    }
}

/// Definitions built from a config and a format document
#[derive(Debug)]
pub struct Session {
    catalog: Catalog,
    default_typedefs: Vec<FieldDef>,
    user_typedefs: Vec<FieldDef>,
    dataset: Map<String, Value>,
}

impl Session {
    /// Builds every definition named by `config` and `format`.
    ///
    /// Any schema or default-value error is reported here, before a single
    /// input byte is read.
    pub fn build(
        config: &Map<String, Value>,
        format: &Map<String, Value>,
        options: SessionConfig,
    ) -> Result<Self> {
        let mut defaults = options.defaults;
        if let Some(section) = section(config, DEFAULTS_KEY)? {
            defaults.apply(section)?;
        }
        if let Some(section) = section(format, DEFAULTS_KEY)? {
            defaults.apply(section)?;
        }

        let mut catalog = Catalog::new(defaults)?;

        let mut default_typedefs = Vec::new();
        if options.load_config_typedefs {
            if let Some(defs) = section(config, TYPEDEFS_KEY)? {
                catalog.create_fields(DEFAULT_TYPEDEFS, "", true, defs, &mut default_typedefs)?;
            }
        }

        let mut user_typedefs = Vec::new();
        if let Some(defs) = section(format, TYPEDEFS_KEY)? {
            catalog.create_fields(USER_TYPEDEFS, "", true, defs, &mut user_typedefs)?;
        }

        let dataset: Map<String, Value> = format
            .iter()
            .filter(|(key, _)| key.as_str() != DEFAULTS_KEY && key.as_str() != TYPEDEFS_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        debug!(
            "Session ready: {} config typedefs, {} user typedefs, {} dataset entries",
            default_typedefs.len(),
            user_typedefs.len(),
            dataset.len()
        );

        Ok(Self {
            catalog,
            default_typedefs,
            user_typedefs,
            dataset,
        })
    }

    /// The catalog with every registered definition
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Definitions registered from the config document
    pub fn default_typedefs(&self) -> &[FieldDef] {
        &self.default_typedefs
    }

    /// Definitions registered from the format document
    pub fn user_typedefs(&self) -> &[FieldDef] {
        &self.user_typedefs
    }

    /// Selects the structure to decode.
    ///
    /// A named root is looked up among the user typedefs first, then the
    /// config typedefs, and must be a structure. Without a name the
    /// non-reserved entries of the format document form an unregistered
    /// structure called `default_dataset`.
    pub fn root(&self, name: Option<&str>) -> Result<FieldDef> {
        match name {
            Some(name) => {
                let found = self
                    .user_typedefs
                    .iter()
                    .chain(self.default_typedefs.iter())
                    .find(|f| f.name() == name)
                    .ok_or_else(|| {
                        Error::invalid_root(format!(
                            "Selected structure \"{}\" definition not found",
                            name
                        ))
                    })?;
                if !found.is_structure() {
                    return Err(Error::invalid_root(format!(
                        "Selected data structure \"{}\" is actually not a structure (invalid type)",
                        name
                    )));
                }
                Ok(found.clone())
            }
            None => {
                if self.dataset.is_empty() {
                    return Err(Error::invalid_root(
                        "Structure not specified and there is no default dataset in format file",
                    ));
                }
                let mut fields = Vec::new();
                self.catalog
                    .append_fields(DEFAULT_DATASET, "", &self.dataset, &mut fields)?;
                Ok(FieldDef::structure(
                    DEFAULT_DATASET,
                    self.catalog.defaults().placement,
                    fields,
                ))
            }
        }
    }
}

fn section<'d>(doc: &'d Map<String, Value>, key: &str) -> Result<Option<&'d Map<String, Value>>> {
    match doc.get(key) {
        None => Ok(None),
        Some(Value::Object(section)) => Ok(Some(section)),
        Some(other) => Err(Error::schema(
            "",
            key,
            format!("object expected, got {}", json_type(other)),
        )),
    }
}
