//! Interface description of the published service.
//!
//! Descriptors are built once at startup and attached to each operation when
//! it is registered. Both the WSDL generator and the SOAP dispatcher read them.

use std::collections::HashMap;
use std::fmt;

/// XML Schema simple types understood by the codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum XsdType {
    String,
    Long,
}

impl XsdType {
    /// Local name in the `xs:` namespace.
    pub fn xsd_name(self) -> &'static str {
        match self {
            XsdType::String => "string",
            XsdType::Long => "long",
        }
    }

    /// Decode element text into a typed value.
    pub fn decode(self, text: &str) -> Result<Value, String> {
        match self {
            XsdType::String => Ok(Value::String(text.to_string())),
            XsdType::Long => text
                .trim()
                .parse::<i64>()
                .map(Value::Long)
                .map_err(|e| format!("'{}' is not a valid xs:long: {e}", text.trim())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    String(String),
    Long(i64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Long(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: String,
    pub ty: XsdType,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, ty: XsdType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnDescriptor {
    /// Unbounded sequence of a simple type, published as `{type}Array`.
    Array(XsdType),
}

impl ReturnDescriptor {
    pub fn item_type(self) -> XsdType {
        match self {
            ReturnDescriptor::Array(ty) => ty,
        }
    }

    pub fn array_type_name(self) -> String {
        format!("{}Array", self.item_type().xsd_name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub name: String,
    pub params: Vec<ParamDescriptor>,
    pub returns: ReturnDescriptor,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>, returns: ReturnDescriptor) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns,
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: XsdType) -> Self {
        self.params.push(ParamDescriptor::new(name, ty));
        self
    }

    pub fn response_name(&self) -> String {
        format!("{}Response", self.name)
    }

    pub fn result_name(&self) -> String {
        format!("{}Result", self.name)
    }

    /// Decode raw element text by parameter name into typed arguments.
    ///
    /// Every declared parameter is required; undeclared elements are ignored.
    pub fn decode_arguments(&self, raw: &HashMap<String, String>) -> Result<Arguments, String> {
        let mut values = HashMap::with_capacity(self.params.len());
        for param in &self.params {
            let text = raw.get(&param.name).ok_or_else(|| {
                format!("missing parameter '{}' for '{}'", param.name, self.name)
            })?;
            let value = param
                .ty
                .decode(text)
                .map_err(|e| format!("invalid parameter '{}': {e}", param.name))?;
            values.insert(param.name.clone(), value);
        }
        Ok(Arguments { values })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub namespace: String,
    pub operations: Vec<OperationDescriptor>,
}

impl ServiceDescriptor {
    pub fn operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|op| op.name == name)
    }

    pub fn port_type_name(&self) -> String {
        self.name.clone()
    }

    pub fn binding_name(&self) -> String {
        format!("{}Binding", self.name)
    }

    pub fn port_name(&self) -> String {
        format!("{}Port", self.name)
    }
}

/// Decoded arguments of one call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Arguments {
    values: HashMap<String, Value>,
}

impl Arguments {
    pub fn string(&self, name: &str) -> Result<&str, String> {
        match self.values.get(name) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(format!("parameter '{name}' is not a string: {other}")),
            None => Err(format!("missing parameter '{name}'")),
        }
    }

    pub fn long(&self, name: &str) -> Result<i64, String> {
        match self.values.get(name) {
            Some(Value::Long(n)) => Ok(*n),
            Some(other) => Err(format!("parameter '{name}' is not a long: {other}")),
            None => Err(format!("missing parameter '{name}'")),
        }
    }
}
