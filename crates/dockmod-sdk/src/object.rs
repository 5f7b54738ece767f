//! Object and function abstractions of the invocation protocol.
//!
//! Objects are stateless between calls: a construction call returns a
//! serialized [`State`], and every method call hands that state back so the
//! object can be rebuilt before running the function.

use std::collections::BTreeMap;

use dockmod_common::error::{DockmodError, Result};
use dockmod_common::types::{DirectoryId, FileId, SecretId};
use dockmod_engine::container::Container;
use dockmod_engine::engine::ContainerEngine;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::schema::{FunctionDef, ModuleSchema};

/// Serialized snapshot of an object's fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State(Vec<u8>);

impl State {
    /// Wraps raw state bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Serializes a state value.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the value cannot be encoded.
    pub fn from_value<S: Serialize>(value: &S) -> Result<Self> {
        Ok(Self(serde_json::to_vec(value)?))
    }

    /// Decodes the state; empty state decodes as `{}`.
    ///
    /// # Errors
    ///
    /// Returns an argument decoding error naming `parent` if the bytes do
    /// not describe an `S`.
    pub fn load<S: DeserializeOwned>(&self) -> Result<S> {
        let bytes: &[u8] = if self.0.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &self.0
        };
        serde_json::from_slice(bytes).map_err(|source| DockmodError::ArgumentDecoding {
            argument: "parent".to_string(),
            source,
        })
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Raw JSON argument payloads keyed by wire name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputArgs(BTreeMap<String, Vec<u8>>);

impl InputArgs {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw payload of an argument.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        self.insert(name, payload);
        self
    }

    /// Sets the JSON encoding of `value` as an argument.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the value cannot be encoded.
    pub fn with_value<T: Serialize>(self, name: impl Into<String>, value: &T) -> Result<Self> {
        Ok(self.with(name, serde_json::to_vec(value)?))
    }

    /// Sets the raw payload of an argument in place.
    pub fn insert(&mut self, name: impl Into<String>, payload: impl Into<Vec<u8>>) {
        let _ = self.0.insert(name.into(), payload.into());
    }

    /// Returns whether an argument is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the argument names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Decodes an argument; an absent or `null` payload yields `None`.
    ///
    /// # Errors
    ///
    /// Returns an argument decoding error naming the argument if the
    /// payload is not a valid `T`.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let Some(payload) = self.0.get(name) else {
            return Ok(None);
        };
        tracing::debug!(argument = name, "decoding argument");
        serde_json::from_slice::<Option<T>>(payload).map_err(|source| {
            DockmodError::ArgumentDecoding {
                argument: name.to_string(),
                source,
            }
        })
    }

    /// Decodes an argument, falling back to the type's zero value.
    ///
    /// # Errors
    ///
    /// Returns an argument decoding error if the payload is not a valid `T`.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        Ok(self.load(name)?.unwrap_or_default())
    }

    /// Returns the arguments starting with `prefix`, with the prefix removed.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &str) -> Self {
        Self(
            self.0
                .iter()
                .filter_map(|(name, payload)| {
                    name.strip_prefix(prefix)
                        .map(|rest| (rest.to_string(), payload.clone()))
                })
                .collect(),
        )
    }

    /// Returns the arguments starting with none of `prefixes`.
    #[must_use]
    pub fn without_prefixes(&self, prefixes: &[String]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(name, _)| !prefixes.iter().any(|p| name.starts_with(p.as_str())))
                .map(|(name, payload)| (name.clone(), payload.clone()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Vec<u8>>> FromIterator<(K, V)> for InputArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A named capability group exposed through the protocol.
pub trait Object: Send + Sync {
    /// Returns the object type name.
    fn name(&self) -> &str;

    /// Returns the object description.
    fn description(&self) -> &str;

    /// Registers the object, its functions, and any enums they use.
    fn add_type_def(&self, engine: &dyn ContainerEngine, schema: &mut ModuleSchema);

    /// Builds a new instance from construction arguments and returns its
    /// serialized state.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument cannot be decoded or resolved.
    fn new_state(&self, engine: &dyn ContainerEngine, input: &InputArgs) -> Result<State>;

    /// Rebuilds the instance from `state` and runs `function`.
    ///
    /// # Errors
    ///
    /// Returns a not found error for unknown functions, otherwise the
    /// function's own error.
    fn invoke(
        &self,
        engine: &dyn ContainerEngine,
        state: &State,
        function: &str,
        input: &InputArgs,
    ) -> Result<Value>;
}

/// A function of an object whose decoded state is `S`.
pub trait Function<S>: Send + Sync {
    /// Describes the function, registering enums it needs in `schema`.
    fn type_def(&self, engine: &dyn ContainerEngine, schema: &mut ModuleSchema) -> FunctionDef;

    /// Runs the function.
    ///
    /// # Errors
    ///
    /// Returns decoding, configuration, not found, or execution errors.
    fn invoke(&self, engine: &dyn ContainerEngine, state: &S, input: &InputArgs) -> Result<Value>;
}

/// Function table of an object, keyed and ordered by function name.
pub type FunctionMap<S> = BTreeMap<String, Box<dyn Function<S>>>;

/// Looks up a function, reporting unknown names as not found.
///
/// # Errors
///
/// Returns a not found error naming the object and function.
pub fn lookup<'a, S>(
    functions: &'a FunctionMap<S>,
    object: &str,
    name: &str,
) -> Result<&'a dyn Function<S>> {
    functions
        .get(name)
        .map(AsRef::as_ref)
        .ok_or_else(|| DockmodError::not_found("function", format!("{object}.{name}")))
}

/// Resolves a secret argument into a secret registered under `name`.
///
/// The incoming handle does not carry the identifier the consumer expects,
/// so its plaintext is read and stored again under `name`.
///
/// # Errors
///
/// Returns a decoding error for a malformed handle or the engine's error
/// when the secret cannot be read or stored.
pub fn load_secret(
    engine: &dyn ContainerEngine,
    input: &InputArgs,
    arg: &str,
    name: &str,
) -> Result<Option<SecretId>> {
    let Some(handle) = input.load::<SecretId>(arg)? else {
        return Ok(None);
    };
    let plaintext = engine.secret_plaintext(&handle)?;
    engine.set_secret(name, &plaintext).map(Some)
}

/// Decodes a directory argument, loading `default_path` from the codebase
/// when the argument is absent.
///
/// # Errors
///
/// Returns a decoding error or the engine's error for the default path.
pub fn load_directory(
    engine: &dyn ContainerEngine,
    input: &InputArgs,
    arg: &str,
    default_path: &str,
) -> Result<DirectoryId> {
    match input.load::<DirectoryId>(arg)? {
        Some(dir) => Ok(dir),
        None => engine.host_directory(default_path),
    }
}

/// Decodes a file argument, loading `default_path` from the codebase when
/// the argument is absent.
///
/// # Errors
///
/// Returns a decoding error or the engine's error for the default path.
pub fn load_file(
    engine: &dyn ContainerEngine,
    input: &InputArgs,
    arg: &str,
    default_path: &str,
) -> Result<FileId> {
    match input.load::<FileId>(arg)? {
        Some(file) => Ok(file),
        None => engine.host_file(default_path),
    }
}

/// Serializes a container handle as a function result.
///
/// # Errors
///
/// Returns a serialization error if the handle cannot be encoded.
pub fn container_result(container: &Container) -> Result<Value> {
    Ok(serde_json::json!({
        "id": container.id(),
        "container": serde_json::to_value(container)?,
    }))
}
