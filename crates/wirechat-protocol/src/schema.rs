//! Schema registry: loads the protocol schema once and hands out typed codec
//! handles.
//!
//! The schema is a JSON Schema document whose `$defs` hold one entry per wire
//! type. Loading compiles one validator per entry; after that every
//! [`lookup`](SchemaRegistry::lookup) is a map read.
//!
//! ## Availability
//!
//! Loading is asynchronous and may fail (missing file, bad JSON, invalid
//! schema). A failed load is logged and leaves the registry *unavailable*; it
//! never surfaces as an error to whoever triggered it. Codec callers check
//! [`is_available`](SchemaRegistry::is_available) and fall back to JSON.
//!
//! ```text
//! unloaded ──load()──▶ available
//!     │
//!     └──load() fails──▶ unavailable (for good)
//! ```
//!
//! The result of the first `load` sticks: concurrent callers await the same
//! in-flight load, later callers get the cached outcome.

use std::collections::HashMap;
use std::path::PathBuf;

use jsonschema::Validator;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::{Codec, MsgPackCodec, ProtocolError};

/// The schema shipped with this crate.
pub const EMBEDDED_SCHEMA: &str = include_str!("../schema/messages.schema.json");

/// Package prefix that qualified type names may carry.
pub const PACKAGE_PREFIX: &str = "messageApp.";

/// Schema type of the top-level binary frame.
pub const CONTAINER_TYPE: &str = "MessageContainer";

/// Where to read the schema from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// [`EMBEDDED_SCHEMA`].
    Embedded,
    /// A file on disk, read with `tokio::fs`.
    File(PathBuf),
    /// A schema document given as a string.
    Inline(String),
}

/// Compiled validators keyed by type name.
struct CompiledSchemas {
    types: HashMap<String, Validator>,
}

/// Loads and caches the protocol schema.
///
/// Share it behind an `Arc`: the codec and the connection actor read the
/// same instance.
pub struct SchemaRegistry {
    // Empty: not loaded yet. `Some(None)`: load failed.
    state: OnceCell<Option<CompiledSchemas>>,
}

impl SchemaRegistry {
    /// An unloaded registry. Call [`load`](Self::load) before use.
    pub fn new() -> Self {
        Self {
            state: OnceCell::new(),
        }
    }

    /// A registry already loaded with [`EMBEDDED_SCHEMA`].
    pub fn embedded() -> Self {
        Self::loaded_from(EMBEDDED_SCHEMA)
    }

    /// A registry already loaded from a schema string.
    ///
    /// An invalid document yields an unavailable registry, exactly like a
    /// failed [`load`](Self::load).
    pub fn loaded_from(schema: &str) -> Self {
        Self {
            state: OnceCell::new_with(Some(compile_logged(schema))),
        }
    }

    /// Loads the schema from `source`, once.
    ///
    /// Returns whether the registry is available afterwards. Only the first
    /// call reads `source`; every other call (concurrent or later) waits for
    /// and reports that first outcome.
    pub async fn load(&self, source: SchemaSource) -> bool {
        self.state
            .get_or_init(|| async move {
                let text = match read_source(source).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "protocol schema unavailable, using JSON only");
                        return None;
                    }
                };
                compile_logged(&text)
            })
            .await
            .is_some()
    }

    /// Returns `true` once a load has succeeded.
    pub fn is_available(&self) -> bool {
        self.schemas().is_some()
    }

    /// Returns `true` once a load has finished, successfully or not.
    pub fn is_loaded(&self) -> bool {
        self.state.initialized()
    }

    /// Names of every type the schema defines, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .schemas()
            .map(|s| s.types.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// Returns a codec handle for `type_name`.
    ///
    /// The name may carry the [`PACKAGE_PREFIX`].
    ///
    /// # Errors
    /// [`ProtocolError::NotFound`] when the registry is unavailable or the
    /// schema has no such type.
    pub fn lookup(&self, type_name: &str) -> Result<TypeHandle<'_>, ProtocolError> {
        let name = type_name.strip_prefix(PACKAGE_PREFIX).unwrap_or(type_name);
        let (name, validator) = self
            .schemas()
            .and_then(|s| s.types.get_key_value(name))
            .ok_or_else(|| ProtocolError::NotFound(type_name.to_string()))?;
        Ok(TypeHandle {
            name: name.as_str(),
            validator,
        })
    }

    fn schemas(&self) -> Option<&CompiledSchemas> {
        self.state.get().and_then(Option::as_ref)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("loaded", &self.is_loaded())
            .field("available", &self.is_available())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TypeHandle
// ---------------------------------------------------------------------------

/// Validate + encode + decode for one schema type.
///
/// Values are checked against the schema in both directions: before they are
/// serialized and, on the way in, as raw values before they become types.
#[derive(Clone, Copy)]
pub struct TypeHandle<'a> {
    name: &'a str,
    validator: &'a Validator,
}

impl TypeHandle<'_> {
    /// The unqualified type name.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Checks a JSON value against this type.
    ///
    /// # Errors
    /// [`ProtocolError::Validation`] listing up to four problems.
    pub fn validate(&self, value: &Value) -> Result<(), ProtocolError> {
        let mut errors = self.validator.iter_errors(value);
        if let Some(first) = errors.next() {
            let mut message = first.to_string();
            for err in errors.take(3) {
                message.push_str("; ");
                message.push_str(&err.to_string());
            }
            return Err(ProtocolError::Validation {
                type_name: self.name.to_string(),
                message,
            });
        }
        Ok(())
    }

    /// Validates `value`, then serializes it to MessagePack.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        let json = serde_json::to_value(value).map_err(ProtocolError::JsonEncode)?;
        self.validate(&json)?;
        MsgPackCodec.encode(value)
    }

    /// Deserializes MessagePack bytes, validates the raw value, then maps it
    /// onto `T`.
    ///
    /// Validation sees the bytes as sent, so keys `T` would silently drop
    /// still count against the schema.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ProtocolError> {
        let raw: Value = MsgPackCodec.decode(bytes)?;
        self.validate(&raw)?;
        serde_json::from_value(raw).map_err(ProtocolError::JsonDecode)
    }
}

impl std::fmt::Debug for TypeHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeHandle").field("name", &self.name).finish()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

async fn read_source(source: SchemaSource) -> Result<String, ProtocolError> {
    match source {
        SchemaSource::Embedded => Ok(EMBEDDED_SCHEMA.to_string()),
        SchemaSource::Inline(text) => Ok(text),
        SchemaSource::File(path) => tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ProtocolError::SchemaLoad(format!("{}: {e}", path.display()))),
    }
}

fn compile_logged(text: &str) -> Option<CompiledSchemas> {
    match compile(text) {
        Ok(schemas) => {
            tracing::info!(types = schemas.types.len(), "protocol schema loaded");
            Some(schemas)
        }
        Err(e) => {
            tracing::warn!(error = %e, "protocol schema unavailable, using JSON only");
            None
        }
    }
}

/// Compiles one validator per `$defs` entry.
///
/// Each validator gets the whole `$defs` table so that references between
/// types (`#/$defs/GroupMember`) resolve.
fn compile(text: &str) -> Result<CompiledSchemas, ProtocolError> {
    let document: Value = serde_json::from_str(text)
        .map_err(|e| ProtocolError::SchemaLoad(format!("invalid JSON: {e}")))?;

    let defs = document
        .get("$defs")
        .and_then(Value::as_object)
        .filter(|defs| !defs.is_empty())
        .ok_or_else(|| ProtocolError::SchemaCompile("schema has no $defs".into()))?;

    let mut types = HashMap::with_capacity(defs.len());
    for name in defs.keys() {
        let mut root = Map::new();
        if let Some(dialect) = document.get("$schema") {
            root.insert("$schema".into(), dialect.clone());
        }
        root.insert("$defs".into(), Value::Object(defs.clone()));
        root.insert("$ref".into(), Value::String(format!("#/$defs/{name}")));

        let validator = jsonschema::validator_for(&Value::Object(root))
            .map_err(|e| ProtocolError::SchemaCompile(format!("{name}: {e}")))?;
        types.insert(name.clone(), validator);
    }

    Ok(CompiledSchemas { types })
}
