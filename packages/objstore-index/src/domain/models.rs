//! Domain models: index metadata, index assignments, find options

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::value::{IndexValue, ObjectIndexType, MAX_DECIMAL_PRECISION};
use crate::error::{IndexError, Result};

/// Name of the implicit integer identity column of every index table.
pub const ID_COLUMN: &str = "ID";

/// Default declared length of a String index column.
pub const DEFAULT_STRING_PRECISION: u32 = 30;

/// Object naming helpers
pub struct ObjectNaming;

impl ObjectNaming {
    /// `namespace` + object type name → object full name
    pub fn full_name(namespace: &str, object_name: &str) -> String {
        format!("{}.{}", namespace, object_name)
    }
}

/// Declared index column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectIndexMetadata {
    pub name: String,
    pub data_type: ObjectIndexType,
    /// Length for String/Binary, total digits for Decimal
    pub precision: u32,
    /// Fractional digits for Decimal
    pub scale: u32,
    pub nullable: bool,
}

impl ObjectIndexMetadata {
    pub fn new(name: impl Into<String>, data_type: ObjectIndexType) -> Self {
        let precision = match data_type {
            ObjectIndexType::String => DEFAULT_STRING_PRECISION,
            ObjectIndexType::Binary => 16,
            ObjectIndexType::Decimal => 18,
            _ => 0,
        };
        Self {
            name: name.into(),
            data_type,
            precision,
            scale: if data_type == ObjectIndexType::Decimal { 2 } else { 0 },
            nullable: false,
        }
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

impl fmt::Display for ObjectIndexMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}({},{}){}",
            self.name,
            self.data_type,
            self.precision,
            self.scale,
            if self.nullable { "?" } else { "" }
        )
    }
}

/// Index schema of one object type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub namespace: String,
    pub object_name: String,
    #[serde(default)]
    pub indexes: Vec<ObjectIndexMetadata>,
}

impl ObjectMetadata {
    pub fn new(
        namespace: impl Into<String>,
        object_name: impl Into<String>,
        indexes: Vec<ObjectIndexMetadata>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            object_name: object_name.into(),
            indexes,
        }
    }

    pub fn full_name(&self) -> String {
        ObjectNaming::full_name(&self.namespace, &self.object_name)
    }

    pub fn index(&self, name: &str) -> Option<&ObjectIndexMetadata> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Reject schemas no provider can provision
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.object_name.is_empty() {
            return Err(IndexError::validation("Object namespace and name are required"));
        }
        let mut seen = HashSet::new();
        for index in &self.indexes {
            if index.name.is_empty() {
                return Err(IndexError::validation("Index name is empty"));
            }
            if index.name.eq_ignore_ascii_case(ID_COLUMN) {
                return Err(IndexError::validation(format!(
                    "Index name '{}' is reserved",
                    index.name
                )));
            }
            if index.data_type == ObjectIndexType::Unknown {
                return Err(IndexError::validation(format!(
                    "Index '{}' has an unknown data type",
                    index.name
                )));
            }
            if index.data_type == ObjectIndexType::Decimal
                && (index.precision == 0
                    || index.precision > MAX_DECIMAL_PRECISION
                    || index.scale > index.precision)
            {
                return Err(IndexError::validation(format!(
                    "Index '{}' declares DECIMAL({},{}); precision must be 1..={} and scale at most precision",
                    index.name, index.precision, index.scale, MAX_DECIMAL_PRECISION
                )));
            }
            if !seen.insert(index.name.to_ascii_lowercase()) {
                return Err(IndexError::validation(format!(
                    "Index '{}' declared twice",
                    index.name
                )));
            }
        }
        Ok(())
    }
}

/// One `(name, value)` pair: a constraint or an assignment
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectIndex {
    pub name: String,
    pub value: IndexValue,
}

impl ObjectIndex {
    pub fn new(name: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn data_type(&self) -> ObjectIndexType {
        self.value.data_type()
    }
}

impl fmt::Display for ObjectIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// How flat constraints are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FindLogic {
    #[default]
    And,
    Or,
}

/// Uniform comparison applied to every flat constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FindOperator {
    #[default]
    Equals,
    NotEquals,
    Like,
    NotLike,
    In,
    NotIn,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    IsNull,
}

/// Result ordering
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderOptions {
    pub fields: Vec<String>,
    #[serde(default)]
    pub descending: bool,
}

impl OrderOptions {
    pub fn ascending<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            descending: false,
        }
    }

    pub fn descending<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            descending: true,
        }
    }
}

impl fmt::Display for OrderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.fields.join(","),
            if self.descending { " DESC" } else { " ASC" }
        )
    }
}

/// Options of the flat find overload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FindOptions {
    #[serde(default)]
    pub logic: FindLogic,
    #[serde(default)]
    pub operator: FindOperator,
    /// 0 = unlimited
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub order: Option<OrderOptions>,
}

impl FindOptions {
    pub fn new(logic: FindLogic, operator: FindOperator) -> Self {
        Self {
            logic,
            operator,
            limit: 0,
            order: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_order(mut self, order: OrderOptions) -> Self {
        self.order = Some(order);
        self
    }
}

impl fmt::Display for FindOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:?}{}", self.logic, self.operator, self.limit)?;
        if let Some(order) = &self.order {
            write!(f, "{}", order)?;
        }
        Ok(())
    }
}

/// Object handed to the indexer by the enclosing object-store service
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersistentObject {
    pub id: i32,
    pub name: String,
    pub secondary_key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub indexes: Vec<ObjectIndex>,
}

impl PersistentObject {
    pub fn new(id: i32, name: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            id,
            name: name.into(),
            secondary_key: None,
            value: Some(value),
            indexes: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: ObjectIndex) -> Self {
        self.indexes.push(index);
        self
    }
}

/// A full index row produced by `iterate`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexRow {
    values: Vec<(String, IndexValue)>,
}

impl IndexRow {
    pub fn new(values: Vec<(String, IndexValue)>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&IndexValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn value_at(&self, index: usize) -> Option<&IndexValue> {
        self.values.get(index).map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    /// Identity column value, when selected
    pub fn id(&self) -> Option<i64> {
        match self.get(ID_COLUMN) {
            Some(IndexValue::Integer(id)) => Some(*id),
            _ => None,
        }
    }
}
