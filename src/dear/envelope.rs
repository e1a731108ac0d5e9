//! List response envelope
//!
//! The ERP returns lists either bare (`[...]`) or wrapped in an object that
//! carries the list under an entity-specific property plus paging metadata
//! (`{"Total": 12, "Page": 1, "LocationList": [...]}`). Both decode into [`Page`].

use crate::error::{PortalError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// One decoded page of a list endpoint
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total row count reported by the ERP, when wrapped
    pub total: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEnvelope {
    Bare(Vec<Value>),
    Wrapped(Map<String, Value>),
}

/// Decode a list response, accepting a bare array or `{list_property: [...]}`.
///
/// Anything else (scalars, an object without the property, a property that is
/// not an array) is an [`PortalError::UnexpectedShape`].
pub fn decode_page<T: DeserializeOwned>(
    endpoint: &str,
    list_property: &str,
    value: Value,
) -> Result<Page<T>> {
    let shape_error = || PortalError::UnexpectedShape {
        endpoint: endpoint.to_string(),
        property: list_property.to_string(),
    };

    let raw: RawEnvelope = serde_json::from_value(value).map_err(|_| shape_error())?;

    let (rows, total) = match raw {
        RawEnvelope::Bare(rows) => (rows, None),
        RawEnvelope::Wrapped(mut object) => {
            let total = object.get("Total").and_then(Value::as_u64);
            let rows = match object.remove(list_property) {
                Some(Value::Array(rows)) => rows,
                // Empty result sets come back as null on some endpoints
                Some(Value::Null) => Vec::new(),
                _ => return Err(shape_error()),
            };
            (rows, total)
        }
    };

    let items = rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<Vec<T>, _>>()?;

    Ok(Page { items, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        #[serde(rename = "Name")]
        name: String,
    }

    #[test]
    fn decodes_bare_array() {
        let page: Page<Row> =
            decode_page("ref/location", "LocationList", json!([{"Name": "B-VDB"}])).unwrap();
        assert_eq!(page.items, vec![Row { name: "B-VDB".to_string() }]);
        assert_eq!(page.total, None);
    }

    #[test]
    fn decodes_wrapped_object_with_total() {
        let value = json!({
            "Total": 2,
            "Page": 1,
            "LocationList": [{"Name": "B-VDB"}, {"Name": "S-POM"}]
        });
        let page: Page<Row> = decode_page("ref/location", "LocationList", value).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, Some(2));
    }

    #[test]
    fn null_list_is_empty() {
        let value = json!({"Total": 0, "Page": 1, "CustomerList": null});
        let page: Page<Row> = decode_page("customer", "CustomerList", value).unwrap();
        assert!(page.items.is_empty());
    }

    #[test]
    fn wrong_property_is_rejected() {
        let value = json!({"Total": 1, "Products": [{"Name": "x"}]});
        let err = decode_page::<Row>("ref/location", "LocationList", value).unwrap_err();
        assert!(matches!(err, PortalError::UnexpectedShape { .. }));
    }

    #[test]
    fn scalar_is_rejected() {
        let err = decode_page::<Row>("product", "Products", json!("maintenance")).unwrap_err();
        assert!(matches!(err, PortalError::UnexpectedShape { .. }));
    }

    #[test]
    fn malformed_row_is_parse_error() {
        let err = decode_page::<Row>("product", "Products", json!([{"Nope": 1}])).unwrap_err();
        assert!(matches!(err, PortalError::Parse(_)));
    }
}
