// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node parameters: a closed set of renderer value types.

use serde::{Deserialize, Serialize};

/// Declared type of a parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    /// 8-bit unsigned integer
    Byte,
    /// Signed integer
    Int,
    /// Unsigned integer
    UInt,
    /// Boolean
    Bool,
    /// Floating point value
    Float,
    /// RGB colour
    Rgb,
    /// RGBA colour
    Rgba,
    /// 3D vector
    Vector,
    /// 2D vector
    Vector2,
    /// String value
    String,
    /// Opaque renderer pointer
    Pointer,
    /// Reference to another node
    Node,
    /// 4x4 matrix
    Matrix,
    /// One of a fixed list of strings (see [`ParamHints::enum_options`])
    Enum,
    /// Array of another type
    Array(Box<ParamType>),
}

impl ParamType {
    /// Renderer-style type name, also used to name synthesized output ports
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Byte => "BYTE",
            Self::Int => "INT",
            Self::UInt => "UINT",
            Self::Bool => "BOOLEAN",
            Self::Float => "FLOAT",
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
            Self::Vector => "VECTOR",
            Self::Vector2 => "VECTOR2",
            Self::String => "STRING",
            Self::Pointer => "POINTER",
            Self::Node => "NODE",
            Self::Matrix => "MATRIX",
            Self::Enum => "ENUM",
            Self::Array(_) => "ARRAY",
        }
    }

    /// Whether values of this type reference other nodes
    pub fn is_node_link(&self) -> bool {
        match self {
            Self::Node => true,
            Self::Array(element) => **element == Self::Node,
            _ => false,
        }
    }

    /// Whether this is an array of node references
    pub fn is_node_array(&self) -> bool {
        matches!(self, Self::Array(element) if **element == Self::Node)
    }

    /// Types a shader exposes as connectable inputs
    pub fn is_shading_input(&self) -> bool {
        matches!(self, Self::Rgb | Self::Rgba | Self::Float)
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Array(element) => write!(f, "ARRAY[{element}]"),
            other => f.write_str(other.type_name()),
        }
    }
}

/// A parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Byte
    Byte(u8),
    /// Integer
    Int(i32),
    /// Unsigned integer
    UInt(u32),
    /// Boolean
    Bool(bool),
    /// Float
    Float(f32),
    /// RGB colour
    Rgb([f32; 3]),
    /// RGBA colour
    Rgba([f32; 4]),
    /// 3D vector
    Vector([f32; 3]),
    /// 2D vector
    Vector2([f32; 2]),
    /// String
    String(String),
    /// Pointers have no persistable value
    Pointer,
    /// Node reference by name
    Node(Option<String>),
    /// Row-major 4x4 matrix
    Matrix([[f32; 4]; 4]),
    /// Selected enum option
    Enum(String),
    /// Array elements
    Array(Vec<ParamValue>),
}

impl ParamValue {
    /// Zero value for a type
    pub fn default_for(param_type: &ParamType) -> Self {
        match param_type {
            ParamType::Byte => Self::Byte(0),
            ParamType::Int => Self::Int(0),
            ParamType::UInt => Self::UInt(0),
            ParamType::Bool => Self::Bool(false),
            ParamType::Float => Self::Float(0.0),
            ParamType::Rgb => Self::Rgb([0.0; 3]),
            ParamType::Rgba => Self::Rgba([0.0, 0.0, 0.0, 1.0]),
            ParamType::Vector => Self::Vector([0.0; 3]),
            ParamType::Vector2 => Self::Vector2([0.0; 2]),
            ParamType::String => Self::String(String::new()),
            ParamType::Pointer => Self::Pointer,
            ParamType::Node => Self::Node(None),
            ParamType::Matrix => Self::Matrix(IDENTITY),
            ParamType::Enum => Self::Enum(String::new()),
            ParamType::Array(_) => Self::Array(Vec::new()),
        }
    }

    /// Check that this value can be stored in a parameter of `param_type`
    pub fn matches(&self, param_type: &ParamType) -> bool {
        match (self, param_type) {
            (Self::Array(items), ParamType::Array(element)) => {
                items.iter().all(|item| item.matches(element))
            }
            (Self::Byte(_), ParamType::Byte)
            | (Self::Int(_), ParamType::Int)
            | (Self::UInt(_), ParamType::UInt)
            | (Self::Bool(_), ParamType::Bool)
            | (Self::Float(_), ParamType::Float)
            | (Self::Rgb(_), ParamType::Rgb)
            | (Self::Rgba(_), ParamType::Rgba)
            | (Self::Vector(_), ParamType::Vector)
            | (Self::Vector2(_), ParamType::Vector2)
            | (Self::String(_), ParamType::String)
            | (Self::Pointer, ParamType::Pointer)
            | (Self::Node(_), ParamType::Node)
            | (Self::Matrix(_), ParamType::Matrix)
            | (Self::Enum(_), ParamType::Enum) => true,
            _ => false,
        }
    }

    /// Short human readable rendering, used for read-only fields
    pub fn summary(&self) -> String {
        match self {
            Self::Byte(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::UInt(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Rgb([r, g, b]) | Self::Vector([r, g, b]) => format!("{r} {g} {b}"),
            Self::Rgba([r, g, b, a]) => format!("{r} {g} {b} {a}"),
            Self::Vector2([x, y]) => format!("{x} {y}"),
            Self::String(s) | Self::Enum(s) => s.clone(),
            Self::Pointer => "<pointer>".to_string(),
            Self::Node(name) => name.clone().unwrap_or_default(),
            Self::Matrix(_) => "<matrix>".to_string(),
            Self::Array(items) => format!("[{} items]", items.len()),
        }
    }
}

const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Type-specific metadata attached to a parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamHints {
    /// Ordered option list of an enum parameter
    #[serde(default)]
    pub enum_options: Vec<String>,
}

impl ParamHints {
    /// Position of `option` in the enum option list
    pub fn enum_index(&self, option: &str) -> Option<usize> {
        self.enum_options.iter().position(|o| o == option)
    }
}

/// A named, typed parameter with a default and an optional explicit value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    param_type: ParamType,
    default: ParamValue,
    value: Option<ParamValue>,
    #[serde(default)]
    hints: ParamHints,
}

impl Parameter {
    /// Create a parameter with no explicit value
    pub fn new(name: impl Into<String>, param_type: ParamType, default: ParamValue) -> Self {
        Self {
            name: name.into(),
            param_type,
            default,
            value: None,
            hints: ParamHints::default(),
        }
    }

    /// Attach enum options
    pub fn with_enum_options(mut self, options: Vec<String>) -> Self {
        self.hints.enum_options = options;
        self
    }

    /// Parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type
    pub fn param_type(&self) -> &ParamType {
        &self.param_type
    }

    /// Default value
    pub fn default_value(&self) -> &ParamValue {
        &self.default
    }

    /// Current value, falling back to the default when unset
    pub fn value(&self) -> &ParamValue {
        self.value.as_ref().unwrap_or(&self.default)
    }

    /// Explicitly set value, if any
    pub fn explicit_value(&self) -> Option<&ParamValue> {
        self.value.as_ref()
    }

    /// Type-specific hints
    pub fn hints(&self) -> &ParamHints {
        &self.hints
    }

    /// Store a new value after checking it against the declared type
    pub fn set_value(&mut self, value: ParamValue) -> Result<(), ParameterError> {
        if !value.matches(&self.param_type) {
            return Err(ParameterError::TypeMismatch {
                name: self.name.clone(),
                expected: self.param_type.clone(),
            });
        }
        if let ParamValue::Enum(option) = &value {
            if !self.hints.enum_options.is_empty() && self.hints.enum_index(option).is_none() {
                return Err(ParameterError::UnknownEnumOption {
                    name: self.name.clone(),
                    option: option.clone(),
                });
            }
        }
        self.value = Some(value);
        Ok(())
    }

    /// Drop the explicit value
    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// Error when assigning a parameter value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    /// Value does not match the declared type
    #[error("Parameter {name} expects a {expected} value")]
    TypeMismatch {
        /// Parameter name
        name: String,
        /// Declared type
        expected: ParamType,
    },

    /// Enum value outside the option list
    #[error("Parameter {name} has no option {option:?}")]
    UnknownEnumOption {
        /// Parameter name
        name: String,
        /// Rejected option
        option: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_falls_back_to_default() {
        let mut param = Parameter::new("Kd", ParamType::Float, ParamValue::Float(0.7));
        assert_eq!(param.value(), &ParamValue::Float(0.7));
        assert!(param.explicit_value().is_none());

        param.set_value(ParamValue::Float(0.2)).unwrap();
        assert_eq!(param.value(), &ParamValue::Float(0.2));

        param.reset();
        assert_eq!(param.value(), &ParamValue::Float(0.7));
    }

    #[test]
    fn test_set_value_checks_type() {
        let mut param = Parameter::new("name", ParamType::String, ParamValue::String(String::new()));
        let err = param.set_value(ParamValue::Int(3)).unwrap_err();
        assert!(matches!(err, ParameterError::TypeMismatch { .. }));
        assert!(param.explicit_value().is_none());
    }

    #[test]
    fn test_enum_options() {
        let options = vec!["none".to_string(), "front".to_string(), "back".to_string()];
        let mut param = Parameter::new("sidedness", ParamType::Enum, ParamValue::Enum("none".into()))
            .with_enum_options(options);

        assert_eq!(param.hints().enum_index("back"), Some(2));
        param.set_value(ParamValue::Enum("front".into())).unwrap();
        assert!(matches!(
            param.set_value(ParamValue::Enum("sideways".into())),
            Err(ParameterError::UnknownEnumOption { .. })
        ));
        assert_eq!(param.value(), &ParamValue::Enum("front".into()));
    }

    #[test]
    fn test_node_link_types() {
        assert!(ParamType::Node.is_node_link());
        assert!(ParamType::Array(Box::new(ParamType::Node)).is_node_link());
        assert!(ParamType::Array(Box::new(ParamType::Node)).is_node_array());
        assert!(!ParamType::Array(Box::new(ParamType::Float)).is_node_link());
        assert!(ParamType::Rgba.is_shading_input());
        assert!(!ParamType::Int.is_shading_input());
    }

    #[test]
    fn test_array_values_match_element_type() {
        let links = ParamValue::Array(vec![ParamValue::Node(Some("light1".into()))]);
        assert!(links.matches(&ParamType::Array(Box::new(ParamType::Node))));
        assert!(!links.matches(&ParamType::Array(Box::new(ParamType::Float))));
        assert!(ParamValue::default_for(&ParamType::Matrix).matches(&ParamType::Matrix));
    }
}
