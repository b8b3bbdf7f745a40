use crate::error::{CommissionError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One completed business transaction to commission on. `rule` names the
/// rule (by its configured name) that should price this row.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct TransactionRow {
    pub employee: String,
    pub revenue: Decimal,
    #[serde(default)]
    pub cost: Option<Decimal>,
    pub rule: String,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Reads transaction rows from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over
/// `Result<TransactionRow>`. It handles whitespace trimming and flexible
/// record lengths automatically.
pub struct TransactionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TransactionReader<R> {
    /// Creates a new `TransactionReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes rows, so large
    /// batches stream without loading the whole file.
    pub fn rows(self) -> impl Iterator<Item = Result<TransactionRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(CommissionError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "employee, revenue, cost, rule, currency\n\
                    emp-1, 1000, 600, standard, USD\n\
                    emp-2, 500, , flat, ";
        let reader = TransactionReader::new(data.as_bytes());
        let results: Vec<Result<TransactionRow>> = reader.rows().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.employee, "emp-1");
        assert_eq!(first.revenue, dec!(1000));
        assert_eq!(first.cost, Some(dec!(600)));

        let second = results[1].as_ref().unwrap();
        assert_eq!(second.cost, None);
        assert_eq!(second.currency, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "employee, revenue, cost, rule, currency\nemp-1, not-a-number, , standard, USD";
        let reader = TransactionReader::new(data.as_bytes());
        let results: Vec<Result<TransactionRow>> = reader.rows().collect();

        assert!(results[0].is_err());
    }
}
