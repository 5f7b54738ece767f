//! Raw Compose manifest schema, deserialized with `serde_yaml`.
//!
//! Mirrors the subset of the Compose specification the object API
//! understands. Every field accepting both short and long syntax is an
//! untagged enum; normalization happens in [`super::service`].

use std::collections::BTreeMap;

use serde::Deserialize;

/// Root of a Compose manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    /// Optional project name.
    #[serde(default)]
    pub name: Option<String>,
    /// Service definitions keyed by name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSpec>,
}

/// One `services.<name>` entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    /// Image reference.
    pub image: Option<String>,
    /// Build configuration.
    pub build: Option<BuildSpec>,
    /// Explicit container name.
    pub container_name: Option<String>,
    /// Working directory inside the container.
    pub working_dir: Option<String>,
    /// Published ports.
    pub ports: Vec<PortSpec>,
    /// Ports exposed to other services only.
    pub expose: Vec<Scalar>,
    /// Environment variables.
    pub environment: Option<EnvironmentSpec>,
    /// Secrets mounted under `/run/secrets`.
    pub secrets: Vec<SecretSpec>,
    /// Volume mounts.
    pub volumes: Vec<VolumeSpec>,
    /// Services this one depends on.
    pub depends_on: Option<DependsOnSpec>,
    /// Entrypoint override.
    pub entrypoint: Option<CommandSpec>,
    /// Default command override.
    pub command: Option<CommandSpec>,
}

/// `build:` either as a bare context path or in long form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BuildSpec {
    /// `build: ./dir`
    Context(String),
    /// `build: { context, dockerfile, args, target }`
    Long(BuildLong),
}

/// Long form of `build:`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuildLong {
    /// Build context path.
    pub context: Option<String>,
    /// Dockerfile path relative to the context.
    pub dockerfile: Option<String>,
    /// Build arguments.
    pub args: Option<EnvironmentSpec>,
    /// Target stage.
    pub target: Option<String>,
}

/// A string or a number, as accepted for ports and env values.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Integer literal.
    Int(i64),
    /// Float literal (kept for env values such as `1.5`).
    Float(f64),
    /// Boolean literal.
    Bool(bool),
    /// String literal.
    Str(String),
}

impl Scalar {
    /// Returns the scalar rendered as a string.
    pub fn render(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Str(v) => v.clone(),
        }
    }
}

/// An entry of `ports:`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
    /// `"8080:80/tcp"` or `8080`.
    Short(Scalar),
    /// `{ target, published, protocol }`.
    Long(PortLong),
}

/// Long form of a port entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PortLong {
    /// Port inside the container.
    pub target: u16,
    /// Port on the host side.
    #[serde(default)]
    pub published: Option<Scalar>,
    /// `tcp` or `udp`.
    #[serde(default)]
    pub protocol: Option<String>,
}

/// `environment:` (and `build.args:`) as a map or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnvironmentSpec {
    /// `KEY: value` mapping; a null value means "unset".
    Map(BTreeMap<String, Option<Scalar>>),
    /// `- KEY=value` or `- KEY` list.
    List(Vec<String>),
}

impl EnvironmentSpec {
    /// Normalizes to a map where `None` marks a variable without value.
    pub fn to_map(&self) -> BTreeMap<String, Option<String>> {
        match self {
            Self::Map(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.as_ref().map(Scalar::render)))
                .collect(),
            Self::List(items) => items
                .iter()
                .map(|item| match item.split_once('=') {
                    Some((k, v)) => (k.to_string(), Some(v.to_string())),
                    None => (item.clone(), None),
                })
                .collect(),
        }
    }
}

/// An entry of a service's `secrets:`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SecretSpec {
    /// `- my_secret`
    Short(String),
    /// `- source: my_secret`
    Long {
        /// Name of the top-level secret.
        source: String,
    },
}

impl SecretSpec {
    /// Returns the secret name.
    pub fn name(&self) -> &str {
        match self {
            Self::Short(name) | Self::Long { source: name } => name,
        }
    }
}

/// An entry of `volumes:`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VolumeSpec {
    /// `"./src:/app/src:ro"`
    Short(String),
    /// `{ type, source, target }`
    Long(VolumeLong),
}

/// Long form of a volume entry.
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeLong {
    /// `bind`, `volume`, `tmpfs`, ...
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Host path or volume name.
    #[serde(default)]
    pub source: Option<String>,
    /// Path inside the container.
    pub target: String,
}

/// `depends_on:` as a list or a map with conditions.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependsOnSpec {
    /// `- db`
    List(Vec<String>),
    /// `db: { condition: service_healthy }`
    Map(BTreeMap<String, serde_yaml::Value>),
}

impl DependsOnSpec {
    /// Returns the names of the direct dependencies.
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::List(names) => names.clone(),
            Self::Map(map) => map.keys().cloned().collect(),
        }
    }
}

/// `entrypoint:` / `command:` as a string or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    /// Whitespace separated command line.
    Line(String),
    /// Exec form.
    Exec(Vec<String>),
}

impl CommandSpec {
    /// Returns the command as an argument vector.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            Self::Exec(args) => args.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_list_and_map_normalize_identically() {
        let list: EnvironmentSpec = serde_yaml::from_str("[A=1, B]").unwrap();
        let map: EnvironmentSpec = serde_yaml::from_str("{A: 1, B: null}").unwrap();
        assert_eq!(list.to_map(), map.to_map());
        assert_eq!(map.to_map().get("A"), Some(&Some("1".to_string())));
        assert_eq!(map.to_map().get("B"), Some(&None));
    }

    #[test]
    fn depends_on_map_syntax() {
        let spec: DependsOnSpec =
            serde_yaml::from_str("db: {condition: service_healthy}\ncache: {}").unwrap();
        assert_eq!(spec.names(), vec!["cache", "db"]);
    }

    #[test]
    fn command_line_is_split_on_whitespace() {
        let spec: CommandSpec = serde_yaml::from_str("\"npm run  start\"").unwrap();
        assert_eq!(spec.to_args(), vec!["npm", "run", "start"]);
    }

    #[test]
    fn secret_long_syntax() {
        let spec: SecretSpec = serde_yaml::from_str("{source: db_password}").unwrap();
        assert_eq!(spec.name(), "db_password");
    }
}
