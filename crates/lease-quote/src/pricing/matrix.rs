use std::io::{Read, Write};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::rates::resolve_rate;
use super::settings::{LeaseSettings, SettingsCommand};

/// Ratio × term grid of the rates administrators see (`stored + 100`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateMatrix {
    pub terms: Vec<u32>,
    pub rows: Vec<RateMatrixRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateMatrixRow {
    pub ratio: Decimal,
    pub label: String,
    pub cells: Vec<RateCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateCell {
    pub term: u32,
    pub displayed: Decimal,
    pub display_text: String,
    /// `false` when the cell falls back to the base rate.
    pub explicit: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum MatrixImportError {
    #[error("invalid rate CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("rate CSV must start with a 'ratio' column")]
    MissingRatioColumn,
    #[error("column header '{0}' is not a lease term")]
    InvalidTerm(String),
    #[error("row {row}: '{value}' is not a number")]
    InvalidValue { row: usize, value: String },
}

impl RateMatrix {
    /// Grid over the currently selectable ratios and terms.
    pub fn from_settings(settings: &LeaseSettings) -> Self {
        let terms = settings.lease_terms().to_vec();
        let table = settings.rate_table();
        let rows = settings
            .down_payment_ratios()
            .iter()
            .map(|ratio| {
                let cells = terms
                    .iter()
                    .map(|term| {
                        let displayed =
                            resolve_rate(*ratio, *term, table, settings.base_rate());
                        RateCell {
                            term: *term,
                            displayed,
                            display_text: display_rate(displayed),
                            explicit: table.get(*ratio, *term).is_some(),
                        }
                    })
                    .collect();
                RateMatrixRow {
                    ratio: *ratio,
                    label: ratio_label(*ratio),
                    cells,
                }
            })
            .collect();

        Self { terms, rows }
    }

    /// Writes `ratio,<term>...` rows with exact displayed rates.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec!["ratio".to_string()];
        header.extend(self.terms.iter().map(|term| term.to_string()));
        csv_writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.ratio.to_string()];
            record.extend(row.cells.iter().map(|cell| cell.displayed.normalize().to_string()));
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

/// Reads a matrix in the [`RateMatrix::write_csv`] shape into displayed-rate commands.
///
/// Blank cells are skipped so a sheet can update a handful of cells.
pub fn parse_rate_csv<R: Read>(reader: R) -> Result<Vec<SettingsCommand>, MatrixImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let mut columns = headers.iter();
    match columns.next() {
        Some(first) if first.eq_ignore_ascii_case("ratio") => {}
        _ => return Err(MatrixImportError::MissingRatioColumn),
    }
    let terms = columns
        .map(|raw| {
            raw.parse::<u32>()
                .map_err(|_| MatrixImportError::InvalidTerm(raw.to_string()))
        })
        .collect::<Result<Vec<u32>, _>>()?;

    let mut commands = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row = index + 1;
        let mut fields = record.iter();
        let Some(raw_ratio) = fields.next() else {
            continue;
        };
        let ratio = parse_decimal(raw_ratio, row)?;

        for (term, raw) in terms.iter().zip(fields) {
            if raw.is_empty() {
                continue;
            }
            commands.push(SettingsCommand::SetDisplayedRate {
                ratio,
                term: *term,
                displayed: parse_decimal(raw, row)?,
            });
        }
    }

    Ok(commands)
}

fn parse_decimal(raw: &str, row: usize) -> Result<Decimal, MatrixImportError> {
    Decimal::from_str(raw).map_err(|_| MatrixImportError::InvalidValue {
        row,
        value: raw.to_string(),
    })
}

/// Whole rates print without decimals, everything else with one.
pub fn display_rate(displayed: Decimal) -> String {
    if displayed.fract().is_zero() {
        displayed.trunc().normalize().to_string()
    } else {
        let rounded = displayed.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
        format!("{rounded:.1}")
    }
}

/// "30% down" style label for a ratio.
pub fn ratio_label(ratio: Decimal) -> String {
    let percent = (ratio * Decimal::ONE_HUNDRED).round_dp(0);
    format!("{percent}% down")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn matrix_marks_fallback_cells() {
        let mut settings = LeaseSettings::default();
        settings.clear_rate(dec!(0.3), 6);
        let matrix = RateMatrix::from_settings(&settings);

        assert_eq!(matrix.terms, vec![6, 10, 12]);
        let row = &matrix.rows[1];
        assert_eq!(row.label, "30% down");
        assert_eq!(row.cells[0].displayed, dec!(101.286));
        assert_eq!(row.cells[0].display_text, "101.3");
        assert!(!row.cells[0].explicit);
        assert_eq!(row.cells[1].display_text, "137.3");
        assert!(row.cells[1].explicit);
    }

    #[test]
    fn whole_rates_drop_decimals() {
        assert_eq!(display_rate(dec!(136)), "136");
        assert_eq!(display_rate(dec!(136.0)), "136");
        assert_eq!(display_rate(dec!(117.25)), "117.3");
    }

    #[test]
    fn csv_export_feeds_back_into_commands() {
        let settings = LeaseSettings::default();
        let mut buffer = Vec::new();
        RateMatrix::from_settings(&settings)
            .write_csv(&mut buffer)
            .expect("csv written");

        let text = String::from_utf8(buffer).expect("utf8");
        assert!(text.starts_with("ratio,6,10,12\n0.2,134.8,142.6,117\n"));

        let commands = parse_rate_csv(text.as_bytes()).expect("csv parsed");
        assert_eq!(commands.len(), 18);

        let mut rebuilt = settings.clone();
        for command in commands {
            rebuilt.apply(command).expect("command applies");
        }
        assert_eq!(rebuilt, settings);
    }

    #[test]
    fn blank_cells_are_skipped() {
        let csv = "ratio,6,10\n0.3,, 140\n";
        let commands = parse_rate_csv(csv.as_bytes()).expect("csv parsed");
        assert_eq!(
            commands,
            vec![SettingsCommand::SetDisplayedRate {
                ratio: dec!(0.3),
                term: 10,
                displayed: dec!(140)
            }]
        );
    }

    #[test]
    fn bad_headers_are_reported() {
        assert!(matches!(
            parse_rate_csv("rate,6\n0.3,140\n".as_bytes()),
            Err(MatrixImportError::MissingRatioColumn)
        ));
        assert!(matches!(
            parse_rate_csv("ratio,six\n0.3,140\n".as_bytes()),
            Err(MatrixImportError::InvalidTerm(header)) if header == "six"
        ));
        assert!(matches!(
            parse_rate_csv("ratio,6\n0.3,abc\n".as_bytes()),
            Err(MatrixImportError::InvalidValue { row: 1, .. })
        ));
    }
}
