use super::ids::NodeId;
use super::molecule::Molecule;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::fmt;

/// Attribute keys with a meaning shared by templates, molecules and the engine.
pub mod keys {
    pub const ATOM_NAME: &str = "atomname";
    pub const OLD_ATOM_NAME: &str = "_old_atomname";
    pub const RESNAME: &str = "resname";
    pub const RESID: &str = "resid";
    pub const CHAIN: &str = "chain";
    pub const CHARGE: &str = "charge";
    pub const CHARGE_GROUP: &str = "charge_group";
    pub const ATOM_TYPE: &str = "atype";
    pub const ELEMENT: &str = "element";
    pub const POSITION: &str = "position";
    pub const MODIFICATIONS: &str = "modifications";
    pub const REPLACE: &str = "replace";
    pub const PTM_ATOM: &str = "PTM_atom";
    pub const GRAPH: &str = "graph";
    pub const MAPPING_WEIGHTS: &str = "mapping_weights";
}

/// An attribute map, used for particles, interaction metadata and molecule metadata.
pub type Attributes = BTreeMap<String, Value>;

/// A single attribute value.
///
/// Template attribute maps may hold [`Value::Predicate`] entries, which express
/// set-membership or negative constraints instead of literal equality.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// An explicitly unset value.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A 3D position in nanometers.
    Position(Point3<f64>),
    List(Vec<Value>),
    Map(Attributes),
    /// A weight table keyed by particle identifier.
    Weights(BTreeMap<NodeId, f64>),
    /// A molecular graph, used to record which particles an output particle stems from.
    Graph(Box<Molecule>),
    Predicate(LinkPredicate),
}

/// A constraint on an attribute that goes beyond literal equality.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkPredicate {
    /// Matches when the attribute value is one of the choices.
    Choice(Vec<Value>),
    /// Matches when the attribute is missing or differs from the value.
    NotDefinedOrNot(Box<Value>),
}

impl LinkPredicate {
    /// Evaluates the predicate against the attribute `key` of `attributes`.
    pub fn matches(&self, attributes: &Attributes, key: &str) -> bool {
        self.matches_value(attributes.get(key))
    }

    /// Evaluates the predicate against a possibly missing value.
    ///
    /// A missing value is treated as [`Value::Null`] by [`LinkPredicate::Choice`].
    pub fn matches_value(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Choice(choices) => choices.contains(value.unwrap_or(&Value::Null)),
            Self::NotDefinedOrNot(excluded) => value.is_none_or(|v| v != excluded.as_ref()),
        }
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Attributes> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_position(&self) -> Option<&Point3<f64>> {
        match self {
            Self::Position(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_graph(&self) -> Option<&Molecule> {
        match self {
            Self::Graph(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_weights(&self) -> Option<&BTreeMap<NodeId, f64>> {
        match self {
            Self::Weights(w) => Some(w),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Position(p) => write!(f, "({}, {}, {})", p.x, p.y, p.z),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(map) => write!(f, "{{{} keys}}", map.len()),
            Self::Weights(weights) => write!(f, "{weights:?}"),
            Self::Graph(graph) => write!(f, "<graph of {} particles>", graph.len()),
            Self::Predicate(predicate) => write!(f, "{predicate:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Point3<f64>> for Value {
    fn from(value: Point3<f64>) -> Self {
        Self::Position(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for Value {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(Value::from).collect())
    }
}

impl From<Attributes> for Value {
    fn from(value: Attributes) -> Self {
        Self::Map(value)
    }
}

impl From<LinkPredicate> for Value {
    fn from(value: LinkPredicate) -> Self {
        Self::Predicate(value)
    }
}

/// Typed access to the well-known particle attributes.
pub trait ParticleAttributes {
    fn atom_name(&self) -> Option<&str>;
    fn resname(&self) -> Option<&str>;
    fn resid(&self) -> Option<i64>;
    fn chain(&self) -> Option<&str>;
    fn charge_group(&self) -> Option<i64>;
    fn element(&self) -> Option<&str>;
    /// Names of the chemical modifications the particle is tagged with.
    fn modification_names(&self) -> Vec<String>;
}

impl ParticleAttributes for Attributes {
    fn atom_name(&self) -> Option<&str> {
        self.get(keys::ATOM_NAME).and_then(Value::as_str)
    }

    fn resname(&self) -> Option<&str> {
        self.get(keys::RESNAME).and_then(Value::as_str)
    }

    fn resid(&self) -> Option<i64> {
        self.get(keys::RESID).and_then(Value::as_int)
    }

    fn chain(&self) -> Option<&str> {
        self.get(keys::CHAIN).and_then(Value::as_str)
    }

    fn charge_group(&self) -> Option<i64> {
        self.get(keys::CHARGE_GROUP).and_then(Value::as_int)
    }

    fn element(&self) -> Option<&str> {
        self.get(keys::ELEMENT).and_then(Value::as_str)
    }

    fn modification_names(&self) -> Vec<String> {
        match self.get(keys::MODIFICATIONS) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::Str(name)) if !name.is_empty() => vec![name.clone()],
            _ => Vec::new(),
        }
    }
}

/// Builds an [`Attributes`] map from `key => value` pairs.
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::core::models::value::Attributes::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut attributes = $crate::core::models::value::Attributes::new();
        $(
            attributes.insert(
                ::std::string::String::from($key),
                $crate::core::models::value::Value::from($value),
            );
        )+
        attributes
    }};
}
