//! Query filter for `LoadBizObjects`.
//!
//! # Design
//! The service expects the filter as a JSON *string* inside the request
//! envelope, not as a nested object. `Filter` models that document and
//! `Filter::to_json` produces the string. Operator codes and values are not
//! validated here; the service is the authority on what it accepts.

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// Comparison operator of a single predicate, sent as its integer code.
///
/// Codes the client has no name for parse as `Other` and are sent back
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
pub enum MatchOperator {
    GreaterThan,
    GreaterOrEqual,
    Equal,
    LessOrEqual,
    LessThan,
    NotEqual,
    InRange,
    NotInRange,
    /// Substring ("fuzzy") match.
    Contains,
    Other(u8),
}

impl From<MatchOperator> for u8 {
    fn from(op: MatchOperator) -> Self {
        match op {
            MatchOperator::GreaterThan => 0,
            MatchOperator::GreaterOrEqual => 1,
            MatchOperator::Equal => 2,
            MatchOperator::LessOrEqual => 3,
            MatchOperator::LessThan => 4,
            MatchOperator::NotEqual => 5,
            MatchOperator::InRange => 6,
            MatchOperator::NotInRange => 7,
            MatchOperator::Contains => 8,
            MatchOperator::Other(code) => code,
        }
    }
}

impl From<u8> for MatchOperator {
    fn from(code: u8) -> Self {
        match code {
            0 => MatchOperator::GreaterThan,
            1 => MatchOperator::GreaterOrEqual,
            2 => MatchOperator::Equal,
            3 => MatchOperator::LessOrEqual,
            4 => MatchOperator::LessThan,
            5 => MatchOperator::NotEqual,
            6 => MatchOperator::InRange,
            7 => MatchOperator::NotInRange,
            8 => MatchOperator::Contains,
            other => MatchOperator::Other(other),
        }
    }
}

/// How the predicates of a `Matcher` combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatcherType {
    #[default]
    And,
    Or,
}

/// A leaf predicate: `Name <Operator> Value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MatcherItem {
    /// Always `"Item"` for leaves.
    #[serde(rename = "Type")]
    pub kind: String,
    pub name: String,
    pub operator: MatchOperator,
    /// Comparison value, always carried as a string.
    pub value: String,
}

impl MatcherItem {
    pub fn new(name: impl Into<String>, operator: MatchOperator, value: impl ToString) -> Self {
        Self {
            kind: "Item".to_string(),
            name: name.into(),
            operator,
            value: value.to_string(),
        }
    }
}

/// A predicate group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Matcher {
    #[serde(rename = "Type")]
    pub kind: MatcherType,
    pub matchers: Vec<MatcherItem>,
}

/// Filter document for `LoadBizObjects`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Filter {
    /// First row of the page.
    pub from_row_num: u32,
    /// Last row of the page.
    pub to_row_num: u32,
    /// Ask the service to report the total row count.
    pub require_count: bool,
    /// Fields to return; empty returns all fields.
    pub return_items: Vec<String>,
    /// Not supported by the service yet; always sent empty.
    pub sort_by_collection: Vec<String>,
    pub matcher: Matcher,
}

impl Filter {
    /// An "And" filter with no predicates, no projection and no count.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(mut self, from: u32, to: u32) -> Self {
        self.from_row_num = from;
        self.to_row_num = to;
        self
    }

    pub fn require_count(mut self, require: bool) -> Self {
        self.require_count = require;
        self
    }

    pub fn return_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.return_items = items.into_iter().map(Into::into).collect();
        self
    }

    /// Append a predicate to the top-level group.
    pub fn matching(mut self, name: impl Into<String>, operator: MatchOperator, value: impl ToString) -> Self {
        self.matcher.matchers.push(MatcherItem::new(name, operator, value));
        self
    }

    /// Serialize to the JSON string carried in the envelope's `Filter` field.
    pub fn to_json(&self) -> ApiResult<String> {
        serde_json::to_string(self).map_err(|e| ApiError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_empty_and_group() {
        let json = Filter::new().to_json().unwrap();
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(back.matcher.kind, MatcherType::And);
        assert!(back.matcher.matchers.is_empty());
        assert!(!back.require_count);
        assert!(back.return_items.is_empty());
        assert!(back.sort_by_collection.is_empty());
    }

    #[test]
    fn default_filter_wire_shape() {
        let value: serde_json::Value = serde_json::from_str(&Filter::new().to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "FromRowNum": 0,
                "ToRowNum": 0,
                "RequireCount": false,
                "ReturnItems": [],
                "SortByCollection": [],
                "Matcher": { "Type": "And", "Matchers": [] }
            })
        );
    }

    #[test]
    fn predicates_are_encoded_with_integer_operators_and_string_values() {
        let filter = Filter::new()
            .rows(0, 49)
            .require_count(true)
            .return_items(["ObjectId", "Name"])
            .matching("Age", MatchOperator::GreaterOrEqual, 18)
            .matching("Name", MatchOperator::Contains, "li");
        let value: serde_json::Value = serde_json::from_str(&filter.to_json().unwrap()).unwrap();

        assert_eq!(value["ToRowNum"], 49);
        assert_eq!(value["RequireCount"], true);
        assert_eq!(value["ReturnItems"], serde_json::json!(["ObjectId", "Name"]));
        assert_eq!(
            value["Matcher"]["Matchers"],
            serde_json::json!([
                { "Type": "Item", "Name": "Age", "Operator": 1, "Value": "18" },
                { "Type": "Item", "Name": "Name", "Operator": 8, "Value": "li" }
            ])
        );
    }

    #[test]
    fn operator_codes_cover_all_variants() {
        for code in 0u8..=8 {
            let op = MatchOperator::from(code);
            assert!(!matches!(op, MatchOperator::Other(_)));
            assert_eq!(u8::from(op), code);
        }
        assert_eq!(MatchOperator::from(9), MatchOperator::Other(9));
    }

    #[test]
    fn or_group_parses() {
        let raw = r#"{"FromRowNum":0,"ToRowNum":10,"RequireCount":false,"ReturnItems":[],
            "SortByCollection":[],"Matcher":{"Type":"Or","Matchers":[]}}"#;
        let filter: Filter = serde_json::from_str(raw).unwrap();
        assert_eq!(filter.matcher.kind, MatcherType::Or);
        assert_eq!(filter.to_row_num, 10);
    }

    #[test]
    fn unknown_operator_code_survives_a_round_trip() {
        let raw = r#"{"FromRowNum":0,"ToRowNum":10,"RequireCount":false,"ReturnItems":[],"SortByCollection":[],
            "Matcher":{"Type":"And","Matchers":[{"Type":"Item","Name":"a","Operator":42,"Value":"1"}]}}"#;
        let filter: Filter = serde_json::from_str(raw).unwrap();
        assert_eq!(filter.matcher.matchers[0].operator, MatchOperator::Other(42));

        let value: serde_json::Value = serde_json::from_str(&filter.to_json().unwrap()).unwrap();
        assert_eq!(value["Matcher"]["Matchers"][0]["Operator"], 42);
    }
}
