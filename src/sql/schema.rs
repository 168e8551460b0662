//! Mapping schema: how application entity types map onto tables and columns

use std::collections::HashMap;

use crate::ast::Value;

/// All mapped entity types known to a translation
#[derive(Debug, Clone, Default)]
pub struct MappingSchema {
    /// Map from entity name (case-insensitive key) to entity description
    entities: HashMap<String, EntityDescribe>,
}

impl MappingSchema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity to the schema
    pub fn add_entity(&mut self, entity: EntityDescribe) {
        self.entities.insert(entity.name.to_lowercase(), entity);
    }

    /// Get an entity by name (case-insensitive)
    pub fn get_entity(&self, name: &str) -> Option<&EntityDescribe> {
        self.entities.get(&name.to_lowercase())
    }

    /// Get all entities
    pub fn entities(&self) -> impl Iterator<Item = &EntityDescribe> {
        self.entities.values()
    }

    /// Check if an entity exists
    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.contains_key(&name.to_lowercase())
    }
}

/// Description of a mapped entity type
#[derive(Debug, Clone)]
pub struct EntityDescribe {
    /// Entity type name (e.g., "Customer")
    pub name: String,
    /// SQL table name (typically snake_case: "customer")
    pub table_name: String,
    /// Fields in declaration order
    fields: Vec<FieldDescribe>,
    /// Object-valued members referring to other entities
    associations: Vec<AssociationDescribe>,
}

impl EntityDescribe {
    /// Create a new entity description
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let table_name = to_snake_case(&name);
        Self {
            name,
            table_name,
            fields: Vec::new(),
            associations: Vec::new(),
        }
    }

    /// Set the SQL table name
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Add a field, builder style
    pub fn with_field(mut self, field: FieldDescribe) -> Self {
        self.add_field(field);
        self
    }

    /// Add an association, builder style
    pub fn with_association(mut self, association: AssociationDescribe) -> Self {
        self.add_association(association);
        self
    }

    /// Add a field to the entity, replacing a field of the same name
    pub fn add_field(&mut self, field: FieldDescribe) {
        match self
            .fields
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(&field.name))
        {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn add_association(&mut self, association: AssociationDescribe) {
        self.associations.push(association);
    }

    /// Get a field by name (case-insensitive)
    pub fn get_field(&self, name: &str) -> Option<&FieldDescribe> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Get an association by member name (case-insensitive)
    pub fn get_association(&self, name: &str) -> Option<&AssociationDescribe> {
        self.associations
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescribe> {
        self.fields.iter()
    }

    /// Primary key fields ordered by key ordinal
    pub fn primary_key(&self) -> Vec<&FieldDescribe> {
        let mut keys: Vec<&FieldDescribe> =
            self.fields.iter().filter(|f| f.primary_key.is_some()).collect();
        keys.sort_by_key(|f| f.primary_key);
        keys
    }
}

/// Description of a mapped field
#[derive(Debug, Clone)]
pub struct FieldDescribe {
    /// Member name (e.g., "OrderId")
    pub name: String,
    /// SQL column name (typically snake_case)
    pub column_name: String,
    pub field_type: ScalarType,
    /// Whether the field can be null
    pub nullable: bool,
    /// Ordinal within the primary key, if the field is part of it
    pub primary_key: Option<u8>,
    /// Value stored in place of null for non-nullable mappings
    pub null_value: Option<Value>,
    /// Trailing whitespace is insignificant (fixed-width char columns)
    pub trimmable: bool,
}

impl FieldDescribe {
    /// Create a new field description
    pub fn new(name: impl Into<String>, field_type: ScalarType) -> Self {
        let name = name.into();
        let column_name = to_snake_case(&name);
        Self {
            name,
            column_name,
            field_type,
            nullable: true,
            primary_key: None,
            null_value: None,
            trimmable: false,
        }
    }

    /// Set the SQL column name
    pub fn with_column_name(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = column_name.into();
        self
    }

    /// Mark the field as part of the primary key
    pub fn with_primary_key(mut self, ordinal: u8) -> Self {
        self.primary_key = Some(ordinal);
        self.nullable = false;
        self
    }

    /// Set whether the field is nullable
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set the value that stands in for null
    pub fn with_null_value(mut self, value: Value) -> Self {
        self.null_value = Some(value);
        self
    }

    pub fn with_trimmable(mut self, trimmable: bool) -> Self {
        self.trimmable = trimmable;
        self
    }
}

/// An object-valued member (e.g. `Order.Customer`) backed by foreign key fields
#[derive(Debug, Clone)]
pub struct AssociationDescribe {
    /// Member name on the owning entity (e.g., "Customer")
    pub name: String,
    /// Entity the member refers to
    pub target_entity: String,
    /// Key fields on the owning entity (e.g., "CustomerId")
    pub this_keys: Vec<String>,
    /// Matching key fields on the target entity (e.g., "Id")
    pub other_keys: Vec<String>,
}

impl AssociationDescribe {
    pub fn new(
        name: impl Into<String>,
        target_entity: impl Into<String>,
        this_keys: &[&str],
        other_keys: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            target_entity: target_entity.into(),
            this_keys: this_keys.iter().map(|s| s.to_string()).collect(),
            other_keys: other_keys.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Scalar column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ScalarType {
    Int,
    Long,
    Double,
    Text,
    Bool,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Int => "int",
            ScalarType::Long => "long",
            ScalarType::Double => "double",
            ScalarType::Text => "text",
            ScalarType::Bool => "bool",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::Long | ScalarType::Double)
    }

    /// Type of a literal value, if it has one
    pub fn of_value(value: &Value) -> Option<ScalarType> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ScalarType::Bool),
            Value::Int(_) => Some(ScalarType::Int),
            Value::Double(_) => Some(ScalarType::Double),
            Value::Text(_) => Some(ScalarType::Text),
        }
    }
}

/// Convert a member name to snake_case for SQL
pub(crate) fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut chars = s.chars().peekable();
    let mut prev_was_upper = false;
    let mut prev_was_underscore = true;

    while let Some(c) = chars.next() {
        if c == '_' {
            result.push('_');
            prev_was_underscore = true;
            prev_was_upper = false;
        } else if c.is_uppercase() {
            // "OrderID" -> "order_id", "HTTPServer" -> "http_server"
            if !prev_was_underscore {
                let next_is_lower = chars.peek().map(|c| c.is_lowercase()).unwrap_or(false);
                if !prev_was_upper || next_is_lower {
                    result.push('_');
                }
            }
            result.extend(c.to_lowercase());
            prev_was_upper = true;
            prev_was_underscore = false;
        } else {
            result.extend(c.to_lowercase());
            prev_was_upper = false;
            prev_was_underscore = false;
        }
    }

    result
}

/// Builder for assembling a schema from entity descriptions
pub struct SchemaBuilder {
    schema: MappingSchema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: MappingSchema::new(),
        }
    }

    /// Add an entity
    pub fn with_entity(mut self, entity: EntityDescribe) -> Self {
        self.schema.add_entity(entity);
        self
    }

    /// Build the schema
    pub fn build(self) -> MappingSchema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_conversion() {
        assert_eq!(to_snake_case("Order"), "order");
        assert_eq!(to_snake_case("CustomerId"), "customer_id");
        assert_eq!(to_snake_case("Line_Item"), "line_item");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("getHTTPResponse"), "get_http_response");
    }

    #[test]
    fn test_schema_lookup() {
        let schema = SchemaBuilder::new()
            .with_entity(
                EntityDescribe::new("Customer")
                    .with_field(FieldDescribe::new("Id", ScalarType::Int).with_primary_key(0))
                    .with_field(FieldDescribe::new("Name", ScalarType::Text)),
            )
            .build();

        assert!(schema.get_entity("Customer").is_some());
        assert!(schema.get_entity("customer").is_some());

        let customer = schema.get_entity("CUSTOMER").unwrap();
        assert_eq!(customer.table_name, "customer");
        assert!(customer.get_field("name").is_some());
        assert!(!customer.get_field("Id").unwrap().nullable);
    }

    #[test]
    fn test_primary_key_order() {
        let entity = EntityDescribe::new("OrderLine")
            .with_field(FieldDescribe::new("LineNo", ScalarType::Int).with_primary_key(1))
            .with_field(FieldDescribe::new("Qty", ScalarType::Int))
            .with_field(FieldDescribe::new("OrderId", ScalarType::Int).with_primary_key(0));

        let keys: Vec<&str> = entity.primary_key().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(keys, vec!["OrderId", "LineNo"]);
    }

    #[test]
    fn test_add_field_replaces_existing() {
        let mut entity = EntityDescribe::new("Customer");
        entity.add_field(FieldDescribe::new("Name", ScalarType::Text));
        entity.add_field(FieldDescribe::new("name", ScalarType::Text).with_trimmable(true));

        assert_eq!(entity.fields().count(), 1);
        assert!(entity.get_field("Name").unwrap().trimmable);
    }
}
