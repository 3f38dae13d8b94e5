//! The declarative mapping from CSV columns to transaction fields.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

use serde::{Deserialize, Serialize};

use crate::Error;

/// The transaction field a CSV column is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetField {
    /// The date of the transaction.
    Date,
    /// Money leaving the account.
    Debit,
    /// Money entering the account.
    Credit,
    /// The main description text.
    Description,
    /// A reference that is prepended to the description.
    Reference,
}

impl TargetField {
    /// The data type a column mapped to this field must have.
    pub fn expected_data_type(&self) -> DataType {
        match self {
            TargetField::Date => DataType::Date,
            TargetField::Debit | TargetField::Credit => DataType::Number,
            TargetField::Description | TargetField::Reference => DataType::String,
        }
    }
}

impl Display for TargetField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TargetField::Date => "date",
            TargetField::Debit => "debit",
            TargetField::Credit => "credit",
            TargetField::Description => "description",
            TargetField::Reference => "reference",
        };

        write!(f, "{name}")
    }
}

/// How the values of a column are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// A calendar date in the mapping's format.
    Date,
    /// A decimal number, possibly with currency symbols or separators.
    Number,
    /// Free text.
    String,
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Date => "date",
            DataType::Number => "number",
            DataType::String => "string",
        };

        write!(f, "{name}")
    }
}

/// One CSV column to transaction field rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// The name of the CSV column in the header row.
    pub column: String,
    /// The transaction field the column is mapped to.
    pub field: TargetField,
    /// How the column's values are interpreted.
    pub data_type: DataType,
    /// Whether parsing aborts if the column is missing from the header.
    #[serde(default)]
    pub required: bool,
    /// The date format, e.g. "dd/MM/yyyy". Mandatory for [TargetField::Date].
    #[serde(default)]
    pub format: Option<String>,
}

impl FieldMapping {
    /// Create a mapping with the data type expected by `field`.
    pub fn new(column: &str, field: TargetField) -> Self {
        Self {
            column: column.to_owned(),
            field,
            data_type: field.expected_data_type(),
            required: false,
            format: None,
        }
    }

    /// Mark the mapping as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the date format.
    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_owned());
        self
    }
}

/// How to read the CSV files of one source, e.g. one bank's export format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSourceConfig {
    /// The 1-based line number of the header row.
    pub starting_line: usize,
    /// The column to field rules.
    pub field_mappings: Vec<FieldMapping>,
}

impl ImportSourceConfig {
    /// Check the config before it is saved or used to parse a file.
    ///
    /// # Errors
    /// Returns an:
    /// - [Error::InvalidImportConfig] if the starting line is zero,
    /// - or [Error::InvalidFieldMapping] with every violated mapping rule.
    pub fn validate(&self) -> Result<(), Error> {
        if self.starting_line == 0 {
            return Err(Error::InvalidImportConfig(
                "the starting line must be 1 or greater".to_owned(),
            ));
        }

        let errors = validate_field_mappings(&self.field_mappings);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidFieldMapping(errors))
        }
    }

    /// The first mapping for `field`, if any.
    pub fn mapping_for(&self, field: TargetField) -> Option<&FieldMapping> {
        self.field_mappings
            .iter()
            .find(|mapping| mapping.field == field)
    }
}

/// Check `mappings` against every mapping rule.
///
/// Returns one message per violation, or an empty list if the mappings are
/// valid. Violations are not fail-fast: every broken rule is reported.
pub fn validate_field_mappings(mappings: &[FieldMapping]) -> Vec<String> {
    let mut errors = Vec::new();

    let mut field_counts: BTreeMap<TargetField, usize> = BTreeMap::new();
    for mapping in mappings {
        *field_counts.entry(mapping.field).or_default() += 1;
    }
    let count = |field: TargetField| field_counts.get(&field).copied().unwrap_or(0);

    if count(TargetField::Date) == 0 {
        errors.push("A column must be mapped to the date field".to_owned());
    }

    let date_without_format = mappings.iter().any(|mapping| {
        mapping.field == TargetField::Date
            && mapping
                .format
                .as_deref()
                .is_none_or(|format| format.trim().is_empty())
    });
    if date_without_format {
        errors.push("The date field mapping must have a date format".to_owned());
    }

    if count(TargetField::Description) == 0 {
        errors.push("A column must be mapped to the description field".to_owned());
    }

    if count(TargetField::Debit) == 0 && count(TargetField::Credit) == 0 {
        errors.push("A column must be mapped to the debit or credit field".to_owned());
    }

    for (field, field_count) in &field_counts {
        if *field_count > 1 {
            errors.push(format!("The {field} field is mapped more than once"));
        }
    }

    let mut fields_by_column: BTreeMap<&str, BTreeSet<TargetField>> = BTreeMap::new();
    for mapping in mappings {
        fields_by_column
            .entry(mapping.column.as_str())
            .or_default()
            .insert(mapping.field);
    }

    let signed_amount = BTreeSet::from([TargetField::Debit, TargetField::Credit]);
    for (column, fields) in &fields_by_column {
        if fields.len() > 1 && *fields != signed_amount {
            let fields = fields
                .iter()
                .map(|field| field.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            errors.push(format!(
                "The column \"{column}\" is mapped to more than one field ({fields})"
            ));
        }
    }

    for mapping in mappings {
        let expected = mapping.field.expected_data_type();

        if mapping.data_type != expected {
            errors.push(format!(
                "The {} field must have the {expected} data type, got {}",
                mapping.field, mapping.data_type
            ));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use crate::Error;

    use super::{
        DataType, FieldMapping, ImportSourceConfig, TargetField, validate_field_mappings,
    };

    fn valid_mappings() -> Vec<FieldMapping> {
        vec![
            FieldMapping::new("Date", TargetField::Date)
                .format("dd/MM/yyyy")
                .required(),
            FieldMapping::new("Details", TargetField::Description),
            FieldMapping::new("Reference", TargetField::Reference),
            FieldMapping::new("Withdrawal", TargetField::Debit),
            FieldMapping::new("Deposit", TargetField::Credit),
        ]
    }

    #[test]
    fn valid_mappings_have_no_errors() {
        assert_eq!(validate_field_mappings(&valid_mappings()), Vec::<String>::new());
    }

    #[test]
    fn signed_amount_column_may_map_to_debit_and_credit() {
        let mappings = vec![
            FieldMapping::new("Date", TargetField::Date).format("yyyy-MM-dd"),
            FieldMapping::new("Memo", TargetField::Description),
            FieldMapping::new("Amount", TargetField::Debit),
            FieldMapping::new("Amount", TargetField::Credit),
        ];

        assert!(validate_field_mappings(&mappings).is_empty());
    }

    #[test]
    fn only_debit_is_enough() {
        let mut mappings = valid_mappings();
        mappings.retain(|mapping| mapping.field != TargetField::Credit);

        assert!(validate_field_mappings(&mappings).is_empty());
    }

    #[test]
    fn missing_date_is_one_error() {
        let mut mappings = valid_mappings();
        mappings.retain(|mapping| mapping.field != TargetField::Date);

        assert_eq!(
            validate_field_mappings(&mappings),
            vec!["A column must be mapped to the date field".to_owned()]
        );
    }

    #[test]
    fn date_without_format_is_one_error() {
        let mut mappings = valid_mappings();
        mappings[0].format = Some("  ".to_owned());

        assert_eq!(
            validate_field_mappings(&mappings),
            vec!["The date field mapping must have a date format".to_owned()]
        );
    }

    #[test]
    fn missing_description_is_one_error() {
        let mut mappings = valid_mappings();
        mappings.retain(|mapping| mapping.field != TargetField::Description);

        assert_eq!(
            validate_field_mappings(&mappings),
            vec!["A column must be mapped to the description field".to_owned()]
        );
    }

    #[test]
    fn missing_amounts_is_one_error() {
        let mut mappings = valid_mappings();
        mappings.retain(|mapping| {
            mapping.field != TargetField::Debit && mapping.field != TargetField::Credit
        });

        assert_eq!(
            validate_field_mappings(&mappings),
            vec!["A column must be mapped to the debit or credit field".to_owned()]
        );
    }

    #[test]
    fn duplicate_field_is_one_error() {
        let mut mappings = valid_mappings();
        mappings.push(
            FieldMapping::new("Posted", TargetField::Date).format("dd/MM/yyyy"),
        );

        assert_eq!(
            validate_field_mappings(&mappings),
            vec!["The date field is mapped more than once".to_owned()]
        );
    }

    #[test]
    fn reused_column_is_one_error() {
        let mut mappings = valid_mappings();
        mappings[2].column = "Details".to_owned();

        assert_eq!(
            validate_field_mappings(&mappings),
            vec![
                "The column \"Details\" is mapped to more than one field (description, reference)"
                    .to_owned()
            ]
        );
    }

    #[test]
    fn wrong_data_type_is_one_error() {
        let mut mappings = valid_mappings();
        mappings[3].data_type = DataType::String;

        assert_eq!(
            validate_field_mappings(&mappings),
            vec!["The debit field must have the number data type, got string".to_owned()]
        );
    }

    #[test]
    fn every_violation_is_reported() {
        let mappings = vec![
            FieldMapping::new("Date", TargetField::Date),
            FieldMapping::new("Date", TargetField::Reference),
        ];

        let errors = validate_field_mappings(&mappings);

        assert_eq!(
            errors,
            vec![
                "The date field mapping must have a date format".to_owned(),
                "A column must be mapped to the description field".to_owned(),
                "A column must be mapped to the debit or credit field".to_owned(),
                "The column \"Date\" is mapped to more than one field (date, reference)"
                    .to_owned(),
            ]
        );
    }

    #[test]
    fn zero_starting_line_is_invalid() {
        let config = ImportSourceConfig {
            starting_line: 0,
            field_mappings: valid_mappings(),
        };

        assert!(matches!(
            config.validate(),
            Err(Error::InvalidImportConfig(_))
        ));
    }

    #[test]
    fn config_reports_mapping_errors() {
        let config = ImportSourceConfig {
            starting_line: 1,
            field_mappings: vec![],
        };

        let Err(Error::InvalidFieldMapping(errors)) = config.validate() else {
            panic!("want InvalidFieldMapping");
        };

        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn deserializes_lowercase_names() {
        let mapping: FieldMapping = serde_json::from_str(
            r#"{"column": "Amount", "field": "debit", "data_type": "number"}"#,
        )
        .unwrap();

        assert_eq!(mapping, FieldMapping::new("Amount", TargetField::Debit));
    }
}
