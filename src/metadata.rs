use std::collections::HashSet;
use std::fs::File;

use tracing::debug;
use xz2::read::XzDecoder;

use crate::domain::{MetadataSource, US_DIVISIONS};
use crate::error::CladeError;
use crate::frame::{LazyTable, Table, Value};

pub const DEFAULT_METADATA_COLUMNS: [&str; 7] = [
    "clade_nextstrain",
    "country",
    "date",
    "division",
    "genbank_accession",
    "genbank_accession_rev",
    "host",
];

const AGGREGATION_COLUMNS: [&str; 5] = ["clade", "country", "date", "location", "host"];

pub fn load_metadata(
    source: &MetadataSource,
    num_rows: Option<usize>,
) -> Result<LazyTable, CladeError> {
    match source {
        MetadataSource::Url(url) => Ok(LazyTable::scan_url(url.clone(), num_rows)),
        MetadataSource::Path(path) => {
            if path.extension() == Some("xz") {
                // Legacy single-stream container: decompress into memory and
                // wrap eagerly so downstream code sees one handle type.
                debug!(path = %path, "reading legacy compressed metadata");
                let file = File::open(path.as_std_path())
                    .map_err(|err| CladeError::Filesystem(format!("open {path}: {err}")))?;
                let decoder = XzDecoder::new(file);
                let table = Table::from_reader(decoder, b'\t', num_rows)?;
                Ok(LazyTable::from_table(table))
            } else {
                Ok(LazyTable::scan_path(path.clone(), num_rows))
            }
        }
    }
}

pub fn filter_metadata(metadata: &LazyTable, columns: Option<&[&str]>) -> LazyTable {
    let columns = columns.unwrap_or(&DEFAULT_METADATA_COLUMNS);

    metadata
        .clone()
        .select(columns)
        .filter_eq("country", "USA")
        .filter_in("division", &US_DIVISIONS)
        .filter_eq("host", "Homo sapiens")
        .rename("clade_nextstrain", "clade")
        .rename("division", "location")
        .cast_date("date")
        // Date filtering at the end also removes the nulls the cast produced.
        .filter_not_null("date")
}

pub fn clade_counts(filtered: &LazyTable) -> LazyTable {
    filtered
        .clone()
        .select(&AGGREGATION_COLUMNS)
        .count_by(&["location", "date", "clade"], "count")
}

// One row per physical sequence; a duplicate first token means the assignment
// output can no longer be joined back safely.
pub fn parse_sequence_assignments(assignments: &Table) -> Result<Table, CladeError> {
    let index = assignments.column_index("seqName")?;
    let seq: Vec<Value> = assignments
        .rows()
        .iter()
        .map(|row| match &row[index] {
            Value::Str(name) => name
                .split_whitespace()
                .next()
                .map(|token| Value::Str(token.to_string()))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        })
        .collect();

    let distinct: HashSet<&Value> = seq.iter().collect();
    if distinct.len() != assignments.height() {
        return Err(CladeError::DuplicateSequence);
    }

    let mut parsed = assignments.clone();
    parsed.insert_column(1, "seq", seq)?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const METADATA_TSV: &str = "\
clade_nextstrain\tcountry\tdate\tdivision\tgenbank_accession\tgenbank_accession_rev\thost\tstrain
AA.1\tUSA\t2024-01-05\tCalifornia\tOQ000001\tOQ000001.1\tHomo sapiens\tA1
AA.1\tUSA\t2024-01-05\tCalifornia\tOQ000002\tOQ000002.1\tHomo sapiens\tA2
BB.2\tCanada\t2024-01-06\tOntario\tOQ000003\tOQ000003.1\tHomo sapiens\tB1
AA.1\tUSA\t2023-13-45\tUtah\tOQ000004\tOQ000004.1\tHomo sapiens\tC1
CC.3\tUSA\t2024-02-01\tPuerto Rico\tOQ000005\tOQ000005.1\tHomo sapiens\tD1
DD.4\tUSA\t2024-02-02\tTexas\tOQ000006\tOQ000006.1\tNarwhal\tE1
EE.5\tUSA\t\tWashington DC\tOQ000007\tOQ000007.1\tHomo sapiens\tF1
FF.6\tUSA\t2024-02-03\tGuam\tOQ000008\tOQ000008.1\tHomo sapiens\tG1
";

    fn metadata() -> LazyTable {
        LazyTable::from_table(
            Table::from_reader(METADATA_TSV.as_bytes(), b'\t', None).unwrap(),
        )
    }

    #[test]
    fn filter_keeps_only_us_human_rows_with_valid_dates() {
        let filtered = filter_metadata(&metadata(), None).collect().unwrap();

        assert_eq!(
            filtered.columns(),
            [
                "clade",
                "country",
                "date",
                "location",
                "genbank_accession",
                "genbank_accession_rev",
                "host"
            ]
        );
        // California x2 and Puerto Rico survive; Ontario (country/division),
        // Utah (unparseable date), Narwhal host, null date, and Guam drop.
        assert_eq!(filtered.height(), 3);

        let location = filtered.column_index("location").unwrap();
        let country = filtered.column_index("country").unwrap();
        let host = filtered.column_index("host").unwrap();
        let date = filtered.column_index("date").unwrap();
        for row in filtered.rows() {
            assert_eq!(row[country].as_str(), Some("USA"));
            assert_eq!(row[host].as_str(), Some("Homo sapiens"));
            assert!(crate::domain::is_us_division(row[location].as_str().unwrap()));
            assert_matches!(row[date], Value::Date(_));
        }
    }

    #[test]
    fn filter_accepts_explicit_column_list() {
        let filtered = filter_metadata(
            &metadata(),
            Some(&["clade_nextstrain", "country", "date", "division", "host"]),
        )
        .collect()
        .unwrap();
        assert_eq!(
            filtered.columns(),
            ["clade", "country", "date", "location", "host"]
        );
    }

    #[test]
    fn filter_does_not_consume_input() {
        let lazy = metadata();
        let _ = filter_metadata(&lazy, None).collect().unwrap();
        // The input handle is still usable afterwards.
        assert_eq!(lazy.collect().unwrap().height(), 8);
    }

    #[test]
    fn counts_partition_the_filtered_rows() {
        let filtered = filter_metadata(&metadata(), None);
        let counts = clade_counts(&filtered).collect().unwrap();

        assert_eq!(counts.columns(), ["location", "date", "clade", "count"]);
        let count_index = counts.column_index("count").unwrap();
        let total: i64 = counts
            .rows()
            .iter()
            .map(|row| match row[count_index] {
                Value::Int(count) => count,
                _ => 0,
            })
            .sum();
        assert_eq!(total as usize, filtered.collect().unwrap().height());

        // Two California/2024-01-05/AA.1 rows collapse into one group of 2.
        assert_eq!(counts.height(), 2);
    }

    #[test]
    fn parse_assignments_extracts_first_token() {
        let mut table = Table::new(vec!["seqName".to_string(), "clade".to_string()]);
        table
            .push_row(vec![
                Value::Str(
                    "PP782799.1 Severe acute respiratory syndrome coronavirus 2 isolate \
                     SARS-CoV-2/human/USA/NY-PV74597/2022"
                        .to_string(),
                ),
                Value::Str("BA.5.2.1".to_string()),
            ])
            .unwrap();
        table
            .push_row(vec![
                Value::Str("ABCDEFG Severe caffeine deprivation virus".to_string()),
                Value::Str("XX.99.88.77".to_string()),
            ])
            .unwrap();
        table
            .push_row(vec![
                Value::Str("12345678 ".to_string()),
                Value::Str("howdy".to_string()),
            ])
            .unwrap();

        let parsed = parse_sequence_assignments(&table).unwrap();
        assert_eq!(parsed.columns(), ["seqName", "seq", "clade"]);
        assert_eq!(parsed.rows()[0][1], Value::Str("PP782799.1".to_string()));
        assert_eq!(parsed.rows()[1][1], Value::Str("ABCDEFG".to_string()));
        assert_eq!(parsed.rows()[2][1], Value::Str("12345678".to_string()));
    }

    #[test]
    fn parse_assignments_rejects_duplicate_sequence() {
        let mut table = Table::new(vec!["seqName".to_string()]);
        table
            .push_row(vec![Value::Str("OQ000001.1 isolate one".to_string())])
            .unwrap();
        table
            .push_row(vec![Value::Str("OQ000001.1 isolate two".to_string())])
            .unwrap();

        let err = parse_sequence_assignments(&table).unwrap_err();
        assert_matches!(err, CladeError::DuplicateSequence);
    }
}
