//! CSV readers for the three upstream count tables.
//!
//! Headers are matched case-insensitively against a list of accepted
//! names, so both the published column names (`pincode`,
//! `age_18_greater`, `bio_age_17_`) and the canonical ones
//! (`postal_code`, `age_18_plus`, `biometric_update_count`) load.
//!
//! Update tables may carry either the two age-band sub-columns or a
//! single precomputed total. A total-only table is loaded with the whole
//! count in the 17+ band, since only the sum is used downstream.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use enrol_signal_records_models::{BiometricRow, DemographicRow, EnrolmentRow};

use crate::TableError;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

const DATE: &[&str] = &["date"];
const STATE: &[&str] = &["state"];
const DISTRICT: &[&str] = &["district"];
const POSTAL_CODE: &[&str] = &["postal_code", "pincode", "pin_code", "pin"];

const AGE_0_5: &[&str] = &["age_0_5"];
const AGE_5_17: &[&str] = &["age_5_17"];
const AGE_18_PLUS: &[&str] = &["age_18_plus", "age_18_greater"];

const BIO_5_17: &[&str] = &["bio_age_5_17", "age_5_17"];
const BIO_17_PLUS: &[&str] = &["bio_age_17_", "bio_age_17_plus", "age_17_plus"];
const BIO_TOTAL: &[&str] = &["biometric_update_count", "bio_total"];

const DEMO_5_17: &[&str] = &["demo_age_5_17", "age_5_17"];
const DEMO_17_PLUS: &[&str] = &["demo_age_17_", "demo_age_17_plus", "age_17_plus"];
const DEMO_TOTAL: &[&str] = &["demographic_update_count", "demo_total"];

/// Header positions of the columns shared by every table.
struct LocationColumns {
    date: usize,
    state: usize,
    district: usize,
    postal_code: Option<usize>,
}

/// Where an update table keeps its counts.
enum UpdateColumns {
    Bands { age_5_17: usize, age_17_plus: usize },
    Total(usize),
}

struct TableReader<R: Read> {
    table: &'static str,
    headers: Vec<String>,
    reader: csv::Reader<R>,
}

impl<R: Read> TableReader<R> {
    fn new(table: &'static str, source: R) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        let headers = reader
            .headers()
            .map_err(|source| TableError::Csv { table, source })?
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();

        Ok(Self {
            table,
            headers,
            reader,
        })
    }

    fn find(&self, accepted: &[&str]) -> Option<usize> {
        accepted
            .iter()
            .find_map(|name| self.headers.iter().position(|h| h == name))
    }

    fn require(&self, column: &'static str, accepted: &[&str]) -> Result<usize, TableError> {
        self.find(accepted).ok_or_else(|| TableError::MissingColumn {
            table: self.table,
            column,
            accepted: accepted.join(", "),
        })
    }

    fn location_columns(&self) -> Result<LocationColumns, TableError> {
        let postal_code = self.find(POSTAL_CODE);
        if postal_code.is_none() {
            log::debug!("{} table has no postal code column", self.table);
        }

        Ok(LocationColumns {
            date: self.require("date", DATE)?,
            state: self.require("state", STATE)?,
            district: self.require("district", DISTRICT)?,
            postal_code,
        })
    }

    fn update_columns(
        &self,
        bands: (&[&str], &[&str]),
        total: &[&str],
        column: &'static str,
    ) -> Result<UpdateColumns, TableError> {
        if let (Some(age_5_17), Some(age_17_plus)) = (self.find(bands.0), self.find(bands.1)) {
            return Ok(UpdateColumns::Bands {
                age_5_17,
                age_17_plus,
            });
        }
        Ok(UpdateColumns::Total(self.require(column, total)?))
    }

    /// Calls `on_row` for every data row, stopping at the first error.
    fn for_each_row(
        &mut self,
        mut on_row: impl FnMut(&Cells<'_>) -> Result<(), TableError>,
    ) -> Result<u64, TableError> {
        let table = self.table;
        let mut record = StringRecord::new();
        let mut count = 0u64;

        while self
            .reader
            .read_record(&mut record)
            .map_err(|source| TableError::Csv { table, source })?
        {
            if record.iter().all(str::is_empty) {
                continue;
            }
            let line = record.position().map_or(0, csv::Position::line);
            on_row(&Cells {
                table,
                line,
                record: &record,
            })?;
            count += 1;
        }

        Ok(count)
    }
}

/// One data row with its position, for error reporting.
struct Cells<'a> {
    table: &'static str,
    line: u64,
    record: &'a StringRecord,
}

impl Cells<'_> {
    fn text(&self, index: usize) -> &str {
        self.record.get(index).unwrap_or("")
    }

    fn date(&self, index: usize) -> Result<NaiveDate, TableError> {
        let value = self.text(index);
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
            .ok_or_else(|| TableError::InvalidDate {
                table: self.table,
                line: self.line,
                value: value.to_string(),
            })
    }

    /// Parses a count. Empty cells are 0; whole-valued decimals such as
    /// `12.0` are accepted.
    fn count(&self, index: usize, column: &'static str) -> Result<u64, TableError> {
        let value = self.text(index);
        if value.is_empty() {
            return Ok(0);
        }
        if let Ok(n) = value.parse::<u64>() {
            return Ok(n);
        }

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss,
            clippy::float_cmp
        )]
        let whole = value
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64);

        whole.ok_or_else(|| TableError::InvalidCount {
            table: self.table,
            line: self.line,
            column,
            value: value.to_string(),
        })
    }

    fn location(
        &self,
        cols: &LocationColumns,
    ) -> Result<(NaiveDate, String, String, Option<String>), TableError> {
        let postal_code = cols
            .postal_code
            .map(|i| self.text(i))
            .filter(|pin| !pin.is_empty())
            .map(str::to_string);

        Ok((
            self.date(cols.date)?,
            self.text(cols.state).to_string(),
            self.text(cols.district).to_string(),
            postal_code,
        ))
    }

    fn updates(&self, cols: &UpdateColumns, column: &'static str) -> Result<(u64, u64), TableError> {
        match *cols {
            UpdateColumns::Bands {
                age_5_17,
                age_17_plus,
            } => Ok((self.count(age_5_17, column)?, self.count(age_17_plus, column)?)),
            UpdateColumns::Total(i) => Ok((0, self.count(i, column)?)),
        }
    }
}

/// Reads the enrolment table from any CSV source.
///
/// # Errors
///
/// * If a required column is missing
/// * If any row has an unparseable date or count
pub fn read_enrolment(source: impl Read) -> Result<Vec<EnrolmentRow>, TableError> {
    let mut reader = TableReader::new("enrolment", source)?;
    let loc = reader.location_columns()?;
    let age_0_5 = reader.require("age_0_5", AGE_0_5)?;
    let age_5_17 = reader.require("age_5_17", AGE_5_17)?;
    let age_18_plus = reader.require("age_18_plus", AGE_18_PLUS)?;

    let mut rows = Vec::new();
    reader.for_each_row(|cells| {
        let (date, state, district, postal_code) = cells.location(&loc)?;
        rows.push(EnrolmentRow {
            date,
            state,
            district,
            postal_code,
            age_0_5: cells.count(age_0_5, "age_0_5")?,
            age_5_17: cells.count(age_5_17, "age_5_17")?,
            age_18_plus: cells.count(age_18_plus, "age_18_plus")?,
        });
        Ok(())
    })?;

    Ok(rows)
}

/// Reads the biometric-update table from any CSV source.
///
/// # Errors
///
/// * If neither the age-band columns nor a total column are present
/// * If any row has an unparseable date or count
pub fn read_biometric(source: impl Read) -> Result<Vec<BiometricRow>, TableError> {
    let mut reader = TableReader::new("biometric", source)?;
    let loc = reader.location_columns()?;
    let counts =
        reader.update_columns((BIO_5_17, BIO_17_PLUS), BIO_TOTAL, "biometric_update_count")?;

    let mut rows = Vec::new();
    reader.for_each_row(|cells| {
        let (date, state, district, postal_code) = cells.location(&loc)?;
        let (age_5_17, age_17_plus) = cells.updates(&counts, "biometric_update_count")?;
        rows.push(BiometricRow {
            date,
            state,
            district,
            postal_code,
            age_5_17,
            age_17_plus,
        });
        Ok(())
    })?;

    Ok(rows)
}

/// Reads the demographic-update table from any CSV source.
///
/// # Errors
///
/// * If neither the age-band columns nor a total column are present
/// * If any row has an unparseable date or count
pub fn read_demographic(source: impl Read) -> Result<Vec<DemographicRow>, TableError> {
    let mut reader = TableReader::new("demographic", source)?;
    let loc = reader.location_columns()?;
    let counts = reader.update_columns(
        (DEMO_5_17, DEMO_17_PLUS),
        DEMO_TOTAL,
        "demographic_update_count",
    )?;

    let mut rows = Vec::new();
    reader.for_each_row(|cells| {
        let (date, state, district, postal_code) = cells.location(&loc)?;
        let (age_5_17, age_17_plus) = cells.updates(&counts, "demographic_update_count")?;
        rows.push(DemographicRow {
            date,
            state,
            district,
            postal_code,
            age_5_17,
            age_17_plus,
        });
        Ok(())
    })?;

    Ok(rows)
}

fn open(path: &Path) -> Result<File, TableError> {
    File::open(path).map_err(|source| TableError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Loads the enrolment table from a CSV file.
///
/// # Errors
///
/// * If the file cannot be opened
/// * If [`read_enrolment`] fails
pub fn load_enrolment(path: &Path) -> Result<Vec<EnrolmentRow>, TableError> {
    let rows = read_enrolment(open(path)?)?;
    log::info!("Loaded {} enrolment rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Loads the biometric-update table from a CSV file.
///
/// # Errors
///
/// * If the file cannot be opened
/// * If [`read_biometric`] fails
pub fn load_biometric(path: &Path) -> Result<Vec<BiometricRow>, TableError> {
    let rows = read_biometric(open(path)?)?;
    log::info!("Loaded {} biometric rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Loads the demographic-update table from a CSV file.
///
/// # Errors
///
/// * If the file cannot be opened
/// * If [`read_demographic`] fails
pub fn load_demographic(path: &Path) -> Result<Vec<DemographicRow>, TableError> {
    let rows = read_demographic(open(path)?)?;
    log::info!("Loaded {} demographic rows from {}", rows.len(), path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn reads_published_enrolment_headers() {
        let csv = "\
date,state,district,pincode,age_0_5,age_5_17,age_18_greater
01-03-2025,Bihar,Patna,800001,3,4,12
2025-03-02,Bihar,Patna,800001,0,1,2.0
";
        let rows = read_enrolment(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, ymd(2025, 3, 1));
        assert_eq!(rows[0].postal_code.as_deref(), Some("800001"));
        assert_eq!(rows[0].age_18_plus, 12);
        assert_eq!(rows[1].date, ymd(2025, 3, 2));
        assert_eq!(rows[1].age_18_plus, 2);
    }

    #[test]
    fn missing_postal_column_yields_none() {
        let csv = "Date,State,District,age_0_5,age_5_17,age_18_plus\n2025-01-01,Goa,North Goa,1,1,1\n";
        let rows = read_enrolment(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].postal_code, None);
        assert_eq!(rows[0].district, "North Goa");
    }

    #[test]
    fn reads_biometric_age_bands() {
        let csv = "\
date,state,district,pincode,bio_age_5_17,bio_age_17_
2025-01-05,Assam,Kamrup,781001,2,7
";
        let rows = read_biometric(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].age_5_17, 2);
        assert_eq!(rows[0].age_17_plus, 7);
        assert_eq!(rows[0].update_count(), 9);
    }

    #[test]
    fn reads_demographic_total_column() {
        let csv = "\
date,state,district,postal_code,demographic_update_count
2025-01-05,Assam,Kamrup,781001,11
";
        let rows = read_demographic(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].update_count(), 11);
    }

    #[test]
    fn missing_count_column_is_an_error() {
        let csv = "date,state,district,age_0_5,age_5_17\n2025-01-01,Goa,North Goa,1,1\n";
        let err = read_enrolment(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            TableError::MissingColumn {
                column: "age_18_plus",
                ..
            }
        ));
    }

    #[test]
    fn bad_date_reports_line() {
        let csv = "\
date,state,district,age_0_5,age_5_17,age_18_plus
2025-01-01,Goa,North Goa,1,1,1
not-a-date,Goa,North Goa,1,1,1
";
        let err = read_enrolment(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::InvalidDate { line: 3, .. }));
    }

    #[test]
    fn negative_count_is_rejected() {
        let csv = "date,state,district,age_0_5,age_5_17,age_18_plus\n2025-01-01,Goa,North Goa,1,-4,1\n";
        let err = read_enrolment(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            TableError::InvalidCount {
                column: "age_5_17",
                ..
            }
        ));
    }

    #[test]
    fn empty_count_cells_are_zero() {
        let csv = "date,state,district,age_0_5,age_5_17,age_18_plus\n2025-01-01,Goa,North Goa,,,5\n";
        let rows = read_enrolment(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].age_0_5, 0);
        assert_eq!(rows[0].age_18_plus, 5);
    }
}
