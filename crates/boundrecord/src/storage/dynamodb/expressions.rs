//! Expression rendering.
//!
//! Conditions and update actions become DynamoDB expression strings. Every
//! attribute name goes through a `#nN` placeholder and every value through a
//! `:vN` placeholder, so reserved words and special characters never reach
//! the expression text.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::Value;

use boundrecord_core::store::{Condition, UpdateAction};

use super::conversions::{to_attribute_value, to_set_value};

/// Accumulates placeholders shared by all expressions of one request.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    names: HashMap<String, String>,
    placeholders: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder for an attribute name; repeated names share one placeholder.
    pub fn name(&mut self, attribute: &str) -> String {
        if let Some(placeholder) = self.placeholders.get(attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.placeholders.len());
        self.placeholders
            .insert(attribute.to_string(), placeholder.clone());
        self.names
            .insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    /// Placeholder for a value.
    pub fn value(&mut self, value: &Value) -> String {
        self.raw_value(to_attribute_value(value))
    }

    fn raw_value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    /// Renders a condition expression.
    pub fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Compare { path, op, value } => {
                let name = self.name(path);
                let value = self.value(value);
                format!("{} {} {}", name, op.symbol(), value)
            }
            Condition::Between { path, low, high } => {
                let name = self.name(path);
                let low = self.value(low);
                let high = self.value(high);
                format!("{} BETWEEN {} AND {}", name, low, high)
            }
            Condition::BeginsWith { path, prefix } => {
                let name = self.name(path);
                let prefix = self.value(&Value::String(prefix.clone()));
                format!("begins_with({}, {})", name, prefix)
            }
            Condition::Contains { path, value } => {
                let name = self.name(path);
                let value = self.value(value);
                format!("contains({}, {})", name, value)
            }
            Condition::Exists(path) => format!("attribute_exists({})", self.name(path)),
            Condition::NotExists(path) => format!("attribute_not_exists({})", self.name(path)),
            Condition::And(left, right) => {
                format!("({} AND {})", self.condition(left), self.condition(right))
            }
            Condition::Or(left, right) => {
                format!("({} OR {})", self.condition(left), self.condition(right))
            }
            Condition::Not(inner) => format!("(NOT {})", self.condition(inner)),
        }
    }

    /// Key condition for a query: hash key equality plus an optional range condition.
    pub fn key_condition(
        &mut self,
        hash_attribute: &str,
        hash_key: &Value,
        range_condition: Option<&Condition>,
    ) -> String {
        let name = self.name(hash_attribute);
        let value = self.value(hash_key);
        match range_condition {
            Some(condition) => format!("{} = {} AND {}", name, value, self.condition(condition)),
            None => format!("{} = {}", name, value),
        }
    }

    /// Renders an update expression, grouping actions by clause.
    pub fn update(&mut self, actions: &[UpdateAction]) -> String {
        let mut set = Vec::new();
        let mut remove = Vec::new();
        let mut add = Vec::new();

        for action in actions {
            match action {
                UpdateAction::Set { path, value } => {
                    let name = self.name(path);
                    set.push(format!("{} = {}", name, self.value(value)));
                }
                UpdateAction::Append { path, values } => {
                    let name = self.name(path);
                    let empty = self.value(&Value::Array(Vec::new()));
                    let values = self.value(&Value::Array(values.clone()));
                    set.push(format!(
                        "{} = list_append(if_not_exists({}, {}), {})",
                        name, name, empty, values
                    ));
                }
                UpdateAction::Remove { path } => remove.push(self.name(path)),
                UpdateAction::Add { path, value } => {
                    let name = self.name(path);
                    let value = self.raw_value(to_set_value(value));
                    add.push(format!("{} {}", name, value));
                }
            }
        }

        let clauses = [("SET", set), ("REMOVE", remove), ("ADD", add)];
        clauses
            .into_iter()
            .filter(|(_, parts)| !parts.is_empty())
            .map(|(keyword, parts)| format!("{} {}", keyword, parts.join(", ")))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Renders a projection expression.
    pub fn projection(&mut self, attributes: &[String]) -> String {
        attributes
            .iter()
            .map(|attribute| self.name(attribute))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Expression attribute names, or `None` when no name was used.
    pub fn names(&self) -> Option<HashMap<String, String>> {
        (!self.names.is_empty()).then(|| self.names.clone())
    }

    /// Expression attribute values, or `None` when no value was used.
    pub fn values(&self) -> Option<HashMap<String, AttributeValue>> {
        (!self.values.is_empty()).then(|| self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_compare_condition() {
        let mut builder = ExpressionBuilder::new();
        let expression = builder.condition(&Condition::ge("price", 10));
        assert_eq!(expression, "#n0 >= :v0");
        assert_eq!(builder.names().unwrap().get("#n0").unwrap(), "price");
        assert_eq!(
            builder.values().unwrap().get(":v0"),
            Some(&AttributeValue::N("10".to_string()))
        );
    }

    #[test]
    fn test_composite_condition() {
        let mut builder = ExpressionBuilder::new();
        let condition = (Condition::exists("id") & Condition::begins_with("sk", "ORDER#"))
            | !Condition::between("total", 1, 5);
        assert_eq!(
            builder.condition(&condition),
            "((attribute_exists(#n0) AND begins_with(#n1, :v0)) OR (NOT #n2 BETWEEN :v1 AND :v2))"
        );
    }

    #[test]
    fn test_names_are_shared() {
        let mut builder = ExpressionBuilder::new();
        let expression =
            builder.condition(&Condition::gt("size", 1).and(Condition::lt("size", 9)));
        assert_eq!(expression, "(#n0 > :v0 AND #n0 < :v1)");
        assert_eq!(builder.names().unwrap().len(), 1);
    }

    #[test]
    fn test_key_condition() {
        let mut builder = ExpressionBuilder::new();
        let expression = builder.key_condition(
            "PK",
            &json!("USER#1"),
            Some(&Condition::begins_with("SK", "ORDER#")),
        );
        assert_eq!(expression, "#n0 = :v0 AND begins_with(#n1, :v1)");
    }

    #[test]
    fn test_update_expression_groups_clauses() {
        let mut builder = ExpressionBuilder::new();
        let expression = builder.update(&[
            UpdateAction::set("name", "x"),
            UpdateAction::remove("draft"),
            UpdateAction::add("views", 1),
            UpdateAction::append("log", vec![json!("created")]),
        ]);
        assert_eq!(
            expression,
            "SET #n0 = :v0, #n3 = list_append(if_not_exists(#n3, :v2), :v3) REMOVE #n1 ADD #n2 :v1"
        );
    }

    #[test]
    fn test_add_uses_sets_for_arrays() {
        let mut builder = ExpressionBuilder::new();
        builder.update(&[UpdateAction::add("tags", json!(["a", "b"]))]);
        assert_eq!(
            builder.values().unwrap().get(":v0"),
            Some(&AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn test_empty_builder_has_no_maps() {
        let builder = ExpressionBuilder::new();
        assert!(builder.names().is_none());
        assert!(builder.values().is_none());
    }

    #[test]
    fn test_projection() {
        let mut builder = ExpressionBuilder::new();
        let expression = builder.projection(&["id".to_string(), "name".to_string()]);
        assert_eq!(expression, "#n0, #n1");
    }
}
