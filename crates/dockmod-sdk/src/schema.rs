//! Typed catalog of the objects and functions a module exposes.
//!
//! The schema is built explicitly from parsed descriptors and serialized
//! as the answer to a schema call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of an argument or return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDef {
    /// A string.
    String,
    /// An object handle of the named type (`Container`, `Secret`, ...).
    Object {
        /// Object type name.
        name: String,
    },
    /// A value of a registered enum.
    Enum {
        /// Enum type name.
        name: String,
    },
    /// A custom scalar (`Platform`).
    Scalar {
        /// Scalar type name.
        name: String,
    },
}

impl TypeDef {
    /// Shorthand for an object type.
    #[must_use]
    pub fn object(name: impl Into<String>) -> Self {
        Self::Object { name: name.into() }
    }
}

/// One argument of a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArg {
    /// Wire name of the argument.
    pub name: String,
    /// Argument type.
    #[serde(rename = "type")]
    pub type_def: TypeDef,
    /// Whether callers may omit the argument.
    pub optional: bool,
    /// JSON-encoded default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Codebase path loaded when a directory or file argument is omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_path: Option<String>,
    /// Human readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FunctionArg {
    /// Creates a required argument.
    #[must_use]
    pub fn new(name: impl Into<String>, type_def: TypeDef) -> Self {
        Self {
            name: name.into(),
            type_def,
            optional: false,
            default_value: None,
            default_path: None,
            description: None,
        }
    }

    /// Marks the argument optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Sets a default value, which also makes the argument optional.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self.optional = true;
        self
    }

    /// Sets a default codebase path, which also makes the argument optional.
    #[must_use]
    pub fn with_default_path(mut self, path: impl Into<String>) -> Self {
        self.default_path = Some(path.into());
        self.optional = true;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the same argument under another name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// A callable function of an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Function name.
    pub name: String,
    /// Human readable description.
    pub description: String,
    /// Return type.
    pub return_type: TypeDef,
    /// Ordered arguments.
    pub args: Vec<FunctionArg>,
}

impl FunctionDef {
    /// Creates a function without arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, return_type: TypeDef) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            return_type,
            args: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends an argument.
    #[must_use]
    pub fn with_arg(mut self, arg: FunctionArg) -> Self {
        self.args.push(arg);
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = FunctionArg>) -> Self {
        self.args.extend(args);
        self
    }

    /// Returns an argument by name.
    pub fn arg(&self, name: &str) -> Option<&FunctionArg> {
        self.args.iter().find(|a| a.name == name)
    }
}

/// An object type and its functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDef {
    /// Object type name.
    pub name: String,
    /// Human readable description.
    pub description: String,
    /// Functions, sorted by name.
    pub functions: Vec<FunctionDef>,
}

impl ObjectDef {
    /// Creates an object without functions.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            functions: Vec::new(),
        }
    }

    /// Adds a function.
    #[must_use]
    pub fn with_function(mut self, function: FunctionDef) -> Self {
        self.functions.push(function);
        self
    }

    /// Returns a function by name.
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// An enum type referenced by arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    /// Enum type name.
    pub name: String,
    /// Allowed values in declaration order.
    pub values: Vec<String>,
}

/// The full catalog of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSchema {
    /// Module name.
    pub name: String,
    /// Registered objects; the module entrypoint comes first.
    pub objects: Vec<ObjectDef>,
    /// Registered enums.
    pub enums: Vec<EnumDef>,
}

impl ModuleSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
            enums: Vec::new(),
        }
    }

    /// Registers an object.
    pub fn add_object(&mut self, object: ObjectDef) {
        self.objects.push(object);
    }

    /// Registers an enum, replacing any enum of the same name.
    pub fn add_enum(&mut self, def: EnumDef) {
        self.enums.retain(|e| e.name != def.name);
        self.enums.push(def);
    }

    /// Returns an object by name.
    pub fn object(&self, name: &str) -> Option<&ObjectDef> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Returns an enum by name.
    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_make_arguments_optional() {
        let arg = FunctionArg::new("VERSION", TypeDef::String).with_default("1.0");
        assert!(arg.optional);
        assert_eq!(arg.default_value, Some(Value::from("1.0")));

        let dir = FunctionArg::new("dir", TypeDef::object("Directory")).with_default_path(".");
        assert!(dir.optional);
        assert!(dir.default_value.is_none());
    }

    #[test]
    fn type_defs_serialize_with_kind_tag() {
        let json = serde_json::to_value(TypeDef::Enum {
            name: "DockerStage".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "enum");
        assert_eq!(json["name"], "DockerStage");
        assert_eq!(serde_json::to_value(TypeDef::String).unwrap()["kind"], "string");
    }

    #[test]
    fn absent_defaults_are_not_serialized() {
        let json = serde_json::to_value(FunctionArg::new("token", TypeDef::object("Secret"))).unwrap();
        assert!(json.get("default_value").is_none());
        assert_eq!(json["type"]["name"], "Secret");
    }

    #[test]
    fn add_enum_replaces_same_name() {
        let mut schema = ModuleSchema::new("dockmod");
        schema.add_enum(EnumDef {
            name: "DockerStage".into(),
            values: vec!["a".into()],
        });
        schema.add_enum(EnumDef {
            name: "DockerStage".into(),
            values: vec!["b".into()],
        });
        assert_eq!(schema.enums.len(), 1);
        assert_eq!(schema.enum_def("DockerStage").unwrap().values, ["b"]);
    }
}
