use std::io::Write;

use camino::Utf8PathBuf;
use tempfile::TempDir;

use cladecount::domain::MetadataSource;
use cladecount::frame::Value;
use cladecount::metadata::{clade_counts, filter_metadata, load_metadata};

const METADATA_TSV: &str = "\
clade_nextstrain\tcountry\tdate\tdivision\tgenbank_accession\tgenbank_accession_rev\thost\tstrain
AA.1\tUSA\t2024-01-05\tCalifornia\tOQ000001\tOQ000001.1\tHomo sapiens\tA1
BB.2\tUSA\t2024-01-06\tCalifornia\tOQ000002\tOQ000002.1\tHomo sapiens\tA2
AA.1\tCanada\t2024-01-06\tOntario\tOQ000003\tOQ000003.1\tHomo sapiens\tB1
AA.1\tUSA\t2023-13-45\tUtah\tOQ000004\tOQ000004.1\tHomo sapiens\tC1
AA.1\tUSA\t2024-01-05\tCalifornia\tOQ000005\tOQ000005.1\tHomo sapiens\tD1
";

fn write_tsv(dir: &TempDir) -> Utf8PathBuf {
    let path = Utf8PathBuf::from_path_buf(dir.path().join("metadata.tsv")).unwrap();
    std::fs::write(path.as_std_path(), METADATA_TSV).unwrap();
    path
}

fn write_zst(dir: &TempDir) -> Utf8PathBuf {
    let path = Utf8PathBuf::from_path_buf(dir.path().join("metadata.tsv.zst")).unwrap();
    let compressed = zstd::stream::encode_all(METADATA_TSV.as_bytes(), 3).unwrap();
    std::fs::write(path.as_std_path(), compressed).unwrap();
    path
}

fn write_xz(dir: &TempDir) -> Utf8PathBuf {
    let path = Utf8PathBuf::from_path_buf(dir.path().join("metadata.tsv.xz")).unwrap();
    let file = std::fs::File::create(path.as_std_path()).unwrap();
    let mut encoder = xz2::write::XzEncoder::new(file, 6);
    encoder.write_all(METADATA_TSV.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

#[test]
fn loads_plain_zst_and_xz_sources_identically() {
    let dir = tempfile::tempdir().unwrap();
    let sources = [
        MetadataSource::path(write_tsv(&dir)),
        MetadataSource::path(write_zst(&dir)),
        MetadataSource::path(write_xz(&dir)),
    ];

    for source in &sources {
        let table = load_metadata(source, None).unwrap().collect().unwrap();
        assert_eq!(table.height(), 5, "{source:?}");
        assert_eq!(table.columns().len(), 8, "{source:?}");
    }
}

#[test]
fn row_cap_applies_to_rows_read_not_rows_kept() {
    let dir = tempfile::tempdir().unwrap();
    let source = MetadataSource::path(write_tsv(&dir));

    // Cap of 3 covers two USA rows and the Canada row; the filter then drops
    // the Canada row, leaving 2 rather than 3.
    let metadata = load_metadata(&source, Some(3)).unwrap();
    let filtered = filter_metadata(&metadata, None).collect().unwrap();
    assert_eq!(filtered.height(), 2);
}

#[test]
fn filter_and_counts_over_a_file_backed_scan() {
    let dir = tempfile::tempdir().unwrap();
    let source = MetadataSource::path(write_zst(&dir));

    let metadata = load_metadata(&source, None).unwrap();
    let filtered = filter_metadata(&metadata, None);
    let counts = clade_counts(&filtered).collect().unwrap();

    assert_eq!(counts.columns(), ["location", "date", "clade", "count"]);
    // Three valid USA/California rows: two AA.1 on 2024-01-05, one BB.2 on
    // 2024-01-06.
    assert_eq!(counts.height(), 2);

    let count_index = counts.column_index("count").unwrap();
    let clade_index = counts.column_index("clade").unwrap();
    let total: i64 = counts
        .rows()
        .iter()
        .map(|row| match row[count_index] {
            Value::Int(count) => count,
            _ => 0,
        })
        .sum();
    assert_eq!(total, 3);

    let aa1 = counts
        .rows()
        .iter()
        .find(|row| row[clade_index].as_str() == Some("AA.1"))
        .unwrap();
    assert_eq!(aa1[count_index], Value::Int(2));
}

#[test]
fn url_source_stays_lazy_until_collected() {
    // Construction must not touch the network; collect() is the only point
    // where the scan happens.
    let metadata = load_metadata(
        &MetadataSource::url("http://127.0.0.1:1/unreachable/metadata.tsv"),
        None,
    )
    .unwrap();
    let filtered = filter_metadata(&metadata, None);
    assert!(clade_counts(&filtered).collect().is_err());
}
