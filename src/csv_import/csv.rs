//! Parses bank statement CSV files with the field mappings of an import source.

use std::{collections::BTreeMap, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::{
    Error,
    account::AccountId,
    csv_import::date_format::DateFormat,
    import_source::{FieldMapping, ImportSourceConfig, TargetField},
    transaction::TransactionType,
};

/// The description used when a row has neither a description nor a reference.
pub const EMPTY_DESCRIPTION: &str = "NULL";

/// A data row after its columns have been resolved by the field mappings.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    /// The date of the row.
    pub date: Date,
    /// The reference and description, joined with " - ".
    pub description: String,
    /// The money that left the account, if any.
    pub debit: Option<Decimal>,
    /// The money that entered the account, if any.
    pub credit: Option<Decimal>,
    /// The original values keyed by header name.
    pub raw: BTreeMap<String, String>,
}

/// A transaction that will be created when its import is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTransaction {
    /// Identifies the candidate within its import.
    pub temp_id: Uuid,
    /// Whether this is a debit, credit or transfer.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The account money left.
    pub source_account_id: Option<AccountId>,
    /// The account money entered.
    pub target_account_id: Option<AccountId>,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money moved.
    pub amount: Decimal,
    /// When the transaction happened.
    pub date: Date,
    /// The CSV row the candidate was created from.
    #[serde(default)]
    pub raw: BTreeMap<String, String>,
}

impl CandidateTransaction {
    /// Create a candidate from `row`, putting `default_account_id` in the
    /// source slot for debits and in the target slot for credits.
    ///
    /// Returns `None` if the row has no amount.
    pub fn from_row(row: ParsedRow, default_account_id: AccountId) -> Option<Self> {
        let (transaction_type, amount, source_account_id, target_account_id) =
            match (row.debit, row.credit) {
                (Some(debit), _) => (TransactionType::Debit, debit, Some(default_account_id), None),
                (None, Some(credit)) => {
                    (TransactionType::Credit, credit, None, Some(default_account_id))
                }
                (None, None) => return None,
            };

        Some(Self {
            temp_id: Uuid::new_v4(),
            transaction_type,
            source_account_id,
            target_account_id,
            description: row.description,
            amount,
            date: row.date,
            raw: row.raw,
        })
    }
}

/// The header positions of the mapped columns.
struct ColumnIndices {
    date: Option<usize>,
    debit: Option<usize>,
    credit: Option<usize>,
    description: Option<usize>,
    reference: Option<usize>,
    signed_amount: bool,
}

impl ColumnIndices {
    fn resolve(header: &[String], config: &ImportSourceConfig) -> Result<Self, Error> {
        let index_of = |field: TargetField| -> Result<Option<usize>, Error> {
            let Some(mapping) = config.mapping_for(field) else {
                return Ok(None);
            };

            match header.iter().position(|name| *name == mapping.column) {
                Some(index) => Ok(Some(index)),
                None if mapping.required => Err(Error::InvalidCSV(format!(
                    "the required column \"{}\" is missing from the header",
                    mapping.column
                ))),
                None => Ok(None),
            }
        };

        let signed_amount = match (
            config.mapping_for(TargetField::Debit),
            config.mapping_for(TargetField::Credit),
        ) {
            (Some(debit), Some(credit)) => debit.column == credit.column,
            _ => false,
        };

        Ok(Self {
            date: index_of(TargetField::Date)?,
            debit: index_of(TargetField::Debit)?,
            credit: index_of(TargetField::Credit)?,
            description: index_of(TargetField::Description)?,
            reference: index_of(TargetField::Reference)?,
            signed_amount,
        })
    }
}

/// Parse `text` with `config`.
///
/// Lines before `config.starting_line` are skipped, the next line is the
/// header and the rest are data rows. Rows that are too short, have a date
/// that does not match the format, or have no amount are skipped.
///
/// # Errors
/// Returns an:
/// - [Error::InvalidImportConfig] if the config or its date format is invalid,
/// - or [Error::InvalidCSV] if the header is missing or lacks a required column.
pub fn parse_csv(text: &str, config: &ImportSourceConfig) -> Result<Vec<ParsedRow>, Error> {
    config.validate()?;

    let date_format = config
        .mapping_for(TargetField::Date)
        .and_then(|mapping: &FieldMapping| mapping.format.as_deref())
        .map(DateFormat::new)
        .transpose()?
        .ok_or_else(|| {
            Error::InvalidImportConfig("the date field mapping must have a date format".to_owned())
        })?;

    let body = text
        .split_inclusive('\n')
        .skip(config.starting_line - 1)
        .collect::<String>();

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(::csv::Trim::All)
        .from_reader(body.as_bytes());
    let mut records = reader.records();

    let header = match records.next() {
        Some(Ok(record)) => record.iter().map(str::to_owned).collect::<Vec<_>>(),
        Some(Err(error)) => {
            return Err(Error::InvalidCSV(format!("could not read the header: {error}")));
        }
        None => {
            return Err(Error::InvalidCSV(format!(
                "no header found at line {}",
                config.starting_line
            )));
        }
    };

    let columns = ColumnIndices::resolve(&header, config)?;
    let mut rows = Vec::new();

    for (row_number, record) in records.enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(error) => {
                tracing::debug!("Skipping unreadable row {row_number}: {error}");
                continue;
            }
        };

        if record.len() < header.len() {
            tracing::debug!(
                "Skipping row {row_number} with {} of {} fields",
                record.len(),
                header.len()
            );
            continue;
        }

        let value = |index: Option<usize>| index.and_then(|index| record.get(index)).unwrap_or("");

        let Some(date) = date_format.parse(value(columns.date)) else {
            tracing::debug!(
                "Skipping row {row_number} with unparsable date \"{}\"",
                value(columns.date)
            );
            continue;
        };

        let (debit, credit) = if columns.signed_amount {
            split_signed_amount(parse_amount(value(columns.debit)))
        } else {
            (
                parse_amount(value(columns.debit)).map(|amount| amount.abs()),
                parse_amount(value(columns.credit)).map(|amount| amount.abs()),
            )
        };

        if debit.is_none() && credit.is_none() {
            tracing::debug!("Skipping row {row_number} without an amount");
            continue;
        }

        let raw = header
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_owned))
            .collect();

        rows.push(ParsedRow {
            date,
            description: compose_description(value(columns.reference), value(columns.description)),
            debit,
            credit,
            raw,
        });
    }

    Ok(rows)
}

/// Parse `text` and turn every row into a candidate transaction for
/// `default_account_id`.
pub fn parse_candidates(
    text: &str,
    config: &ImportSourceConfig,
    default_account_id: AccountId,
) -> Result<Vec<CandidateTransaction>, Error> {
    Ok(parse_csv(text, config)?
        .into_iter()
        .filter_map(|row| CandidateTransaction::from_row(row, default_account_id))
        .collect())
}

/// Parse an amount, ignoring everything except digits, `.` and `-`.
///
/// Zero and empty amounts are `None`.
fn parse_amount(text: &str) -> Option<Decimal> {
    let cleaned = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect::<String>();

    if cleaned.is_empty() {
        return None;
    }

    match Decimal::from_str(&cleaned) {
        Ok(amount) if amount.is_zero() => None,
        Ok(amount) => Some(amount),
        Err(error) => {
            tracing::debug!("Could not parse amount \"{text}\": {error}");
            None
        }
    }
}

/// Negative amounts are debits and positive amounts are credits.
fn split_signed_amount(amount: Option<Decimal>) -> (Option<Decimal>, Option<Decimal>) {
    match amount {
        Some(amount) if amount.is_sign_negative() => (Some(amount.abs()), None),
        Some(amount) => (None, Some(amount)),
        None => (None, None),
    }
}

fn compose_description(reference: &str, description: &str) -> String {
    match (reference.is_empty(), description.is_empty()) {
        (false, false) => format!("{reference} - {description}"),
        (false, true) => reference.to_owned(),
        (true, false) => description.to_owned(),
        (true, true) => EMPTY_DESCRIPTION.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use time::macros::date;

    use crate::{
        Error,
        import_source::{FieldMapping, ImportSourceConfig, TargetField},
        transaction::TransactionType,
    };

    use super::{EMPTY_DESCRIPTION, parse_candidates, parse_csv};

    fn separate_columns_config(starting_line: usize) -> ImportSourceConfig {
        ImportSourceConfig {
            starting_line,
            field_mappings: vec![
                FieldMapping::new("Date", TargetField::Date)
                    .format("dd/MM/yyyy")
                    .required(),
                FieldMapping::new("Details", TargetField::Description),
                FieldMapping::new("Ref", TargetField::Reference),
                FieldMapping::new("Withdrawal", TargetField::Debit),
                FieldMapping::new("Deposit", TargetField::Credit),
            ],
        }
    }

    fn signed_config() -> ImportSourceConfig {
        ImportSourceConfig {
            starting_line: 1,
            field_mappings: vec![
                FieldMapping::new("Date", TargetField::Date).format("yyyy-MM-dd"),
                FieldMapping::new("Memo", TargetField::Description),
                FieldMapping::new("Amount", TargetField::Debit),
                FieldMapping::new("Amount", TargetField::Credit),
            ],
        }
    }

    #[test]
    fn skips_bad_dates_and_zero_amounts() {
        let text = "Date,Details,Ref,Withdrawal,Deposit\n\
            not a date,Coffee,,4.50,\n\
            02/03/2025,Nothing happened,,0,\n\
            03/03/2025,Groceries,,20.00,\n";

        let candidates = parse_candidates(text, &separate_columns_config(1), 7).unwrap();

        assert_eq!(candidates.len(), 1);
        let candidate = &candidates[0];
        assert_eq!(candidate.transaction_type, TransactionType::Debit);
        assert_eq!(candidate.amount, Decimal::new(2000, 2));
        assert_eq!(candidate.source_account_id, Some(7));
        assert_eq!(candidate.target_account_id, None);
        assert_eq!(candidate.date, date!(2025 - 03 - 03));
        assert_eq!(candidate.description, "Groceries");
    }

    #[test]
    fn signed_negative_amount_is_debit() {
        let text = "Date,Memo,Amount\n2025-01-02,Rent,-45.00\n";

        let rows = parse_csv(text, &signed_config()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].debit, Some(Decimal::new(4500, 2)));
        assert_eq!(rows[0].credit, None);

        let candidates = parse_candidates(text, &signed_config(), 1).unwrap();
        assert_eq!(candidates[0].transaction_type, TransactionType::Debit);
    }

    #[test]
    fn signed_positive_amount_is_credit() {
        let text = "Date,Memo,Amount\n2025-01-02,Salary,45.00\n";

        let rows = parse_csv(text, &signed_config()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].debit, None);
        assert_eq!(rows[0].credit, Some(Decimal::new(4500, 2)));

        let candidates = parse_candidates(text, &signed_config(), 1).unwrap();
        assert_eq!(candidates[0].transaction_type, TransactionType::Credit);
        assert_eq!(candidates[0].target_account_id, Some(1));
    }

    #[test]
    fn signed_zero_amount_is_dropped() {
        let text = "Date,Memo,Amount\n2025-01-02,Nothing,0\n";

        let rows = parse_csv(text, &signed_config()).unwrap();

        assert!(rows.is_empty());
    }

    #[test]
    fn separate_columns_are_absolute() {
        let text = "Date,Details,Ref,Withdrawal,Deposit\n03/03/2025,Refund,,,\"-$1,234.50\"\n";

        let rows = parse_csv(text, &separate_columns_config(1)).unwrap();

        assert_eq!(rows[0].debit, None);
        assert_eq!(rows[0].credit, Some(Decimal::new(123450, 2)));
    }

    #[test]
    fn skips_lines_before_starting_line() {
        let text = "Statement for account 12-3456\n\
            Generated, today\n\
            Date,Details,Ref,Withdrawal,Deposit\n\
            03/03/2025,Groceries,,20.00,\n";

        let rows = parse_csv(text, &separate_columns_config(3)).unwrap();

        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn skips_short_rows() {
        let text = "Date,Details,Ref,Withdrawal,Deposit\n\
            03/03/2025,Truncated\n\
            04/03/2025,Groceries,,20.00,\n";

        let rows = parse_csv(text, &separate_columns_config(1)).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, date!(2025 - 03 - 04));
    }

    #[test]
    fn quoted_fields_may_contain_commas() {
        let text = "Date,Details,Ref,Withdrawal,Deposit\n\
            03/03/2025,\"Dinner, drinks\",,20.00,\n";

        let rows = parse_csv(text, &separate_columns_config(1)).unwrap();

        assert_eq!(rows[0].description, "Dinner, drinks");
    }

    #[test]
    fn composes_description_with_reference() {
        let text = "Date,Details,Ref,Withdrawal,Deposit\n\
            03/03/2025,Groceries,INV-1,20.00,\n\
            04/03/2025,,INV-2,20.00,\n\
            05/03/2025,,,20.00,\n";

        let rows = parse_csv(text, &separate_columns_config(1)).unwrap();

        let descriptions = rows.iter().map(|row| row.description.as_str()).collect::<Vec<_>>();
        assert_eq!(
            descriptions,
            vec!["INV-1 - Groceries", "INV-2", EMPTY_DESCRIPTION]
        );
    }

    #[test]
    fn keeps_raw_row() {
        let text = "Date,Details,Ref,Withdrawal,Deposit\n03/03/2025,Groceries,,20.00,\n";

        let rows = parse_csv(text, &separate_columns_config(1)).unwrap();

        assert_eq!(rows[0].raw.get("Details").map(String::as_str), Some("Groceries"));
        assert_eq!(rows[0].raw.len(), 5);
    }

    #[test]
    fn missing_required_column_aborts() {
        let text = "Posted,Details,Ref,Withdrawal,Deposit\n03/03/2025,Groceries,,20.00,\n";

        let result = parse_csv(text, &separate_columns_config(1));

        assert!(matches!(result, Err(Error::InvalidCSV(_))));
    }

    #[test]
    fn missing_header_aborts() {
        let result = parse_csv("", &separate_columns_config(1));

        assert!(matches!(result, Err(Error::InvalidCSV(_))));
    }

    #[test]
    fn parsing_is_repeatable() {
        let text = "Date,Details,Ref,Withdrawal,Deposit\n\
            03/03/2025,Groceries,,20.00,\n\
            04/03/2025,Salary,,,3000\n\
            05/03/2025,Rent,,1500,\n";
        let config = separate_columns_config(1);

        let first = parse_candidates(text, &config, 1).unwrap();
        let second = parse_candidates(text, &config, 1).unwrap();

        let without_ids = |candidates: Vec<super::CandidateTransaction>| {
            candidates
                .into_iter()
                .map(|candidate| {
                    (
                        candidate.transaction_type,
                        candidate.amount,
                        candidate.date,
                        candidate.description,
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(without_ids(first), without_ids(second));
    }
}
