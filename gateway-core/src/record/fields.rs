/// Extensible error fields and the order they are printed in server logs.

use uuid::Uuid;

use super::ErrorRecord;

/// Fallback classification for errors nobody categorised.
pub const GENERIC_ERROR_CODE: &str = "GENERIC_ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName {
    Guid,
    Description,
    ErrorCode,
    GraphqlModel,
    TargetEndpoint,
    DocsLink,
}

#[derive(Debug, Clone, Copy)]
pub enum FieldDefault {
    None,
    Static(&'static str),
    Generated(fn() -> String),
}

impl FieldDefault {
    pub fn value(&self) -> Option<String> {
        match self {
            FieldDefault::None => None,
            FieldDefault::Static(value) => Some((*value).to_string()),
            FieldDefault::Generated(generate) => Some(generate()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CustomField {
    pub name: FieldName,
    pub label: &'static str,
    pub order: u8,
    pub default: FieldDefault,
}

fn new_guid() -> String {
    Uuid::new_v4().to_string()
}

// guid is declared first but printed last; it already appears in the log header.
pub const CUSTOM_FIELDS: [CustomField; 6] = [
    CustomField {
        name: FieldName::Guid,
        label: "Error GUID",
        order: 10,
        default: FieldDefault::Generated(new_guid),
    },
    CustomField {
        name: FieldName::Description,
        label: "Description",
        order: 1,
        default: FieldDefault::None,
    },
    CustomField {
        name: FieldName::ErrorCode,
        label: "Error Code",
        order: 2,
        default: FieldDefault::Static(GENERIC_ERROR_CODE),
    },
    CustomField {
        name: FieldName::GraphqlModel,
        label: "GraphQL Model",
        order: 3,
        default: FieldDefault::None,
    },
    CustomField {
        name: FieldName::TargetEndpoint,
        label: "Target Endpoint",
        order: 4,
        default: FieldDefault::None,
    },
    CustomField {
        name: FieldName::DocsLink,
        label: "Documentation",
        order: 5,
        default: FieldDefault::None,
    },
];

pub fn field(name: FieldName) -> &'static CustomField {
    CUSTOM_FIELDS
        .iter()
        .find(|field| field.name == name)
        .unwrap_or(&CUSTOM_FIELDS[0])
}

/// The registry sorted by display order.
pub fn fields_in_order() -> Vec<&'static CustomField> {
    let mut fields: Vec<_> = CUSTOM_FIELDS.iter().collect();
    fields.sort_by_key(|field| field.order);
    fields
}

pub fn default_for(name: FieldName) -> Option<String> {
    field(name).default.value()
}

/// `Label: value` lines for every populated field except the guid.
pub fn detail_lines(record: &ErrorRecord) -> Vec<String> {
    fields_in_order()
        .into_iter()
        .filter(|field| field.name != FieldName::Guid)
        .filter_map(|field| {
            record
                .field_value(field.name)
                .filter(|value| !value.is_empty())
                .map(|value| format!("{}: {}", field.label, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_sorted_by_order() {
        let names: Vec<_> = fields_in_order().iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            vec![
                FieldName::Description,
                FieldName::ErrorCode,
                FieldName::GraphqlModel,
                FieldName::TargetEndpoint,
                FieldName::DocsLink,
                FieldName::Guid,
            ]
        );
    }

    #[test]
    fn test_defaults() {
        assert_eq!(default_for(FieldName::ErrorCode).as_deref(), Some(GENERIC_ERROR_CODE));
        assert_eq!(default_for(FieldName::DocsLink), None);

        let first = default_for(FieldName::Guid).unwrap();
        let second = default_for(FieldName::Guid).unwrap();
        assert!(Uuid::parse_str(&first).is_ok());
        assert_ne!(first, second);
    }
}
