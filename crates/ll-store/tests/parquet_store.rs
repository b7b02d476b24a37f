use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use approx::assert_relative_eq;
use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float32Array, Int32Array, ListArray};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{Field, Float32Type};
use arrow::record_batch::RecordBatch;
use ll_core::Error;
use ll_engine::ProjectionReference;
use ll_store::{
    ColumnNames, EventTable, StoreError, append_derived_columns, extract_columns, inspect_columns,
    read_parquet, write_parquet_atomic,
};

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("llflow_store_{}_{}_{}", std::process::id(), nanos, name));
    std::fs::create_dir_all(&p).unwrap();
    p
}

/// (pt, eta, phi, pdgId, id flag)
type Electron = (f32, f32, f32, i32, bool);

struct Row {
    electrons: Vec<Electron>,
    met: (f32, f32),
}

fn list(values: ArrayRef, lengths: &[usize]) -> ArrayRef {
    let field = Arc::new(Field::new("item", values.data_type().clone(), true));
    Arc::new(ListArray::new(field, OffsetBuffer::from_lengths(lengths.iter().copied()), values, None))
}

fn nano_batch(rows: &[Row], drop: &[&str]) -> RecordBatch {
    let lengths: Vec<usize> = rows.iter().map(|r| r.electrons.len()).collect();
    let flat = |f: fn(&Electron) -> f32| -> ArrayRef {
        Arc::new(Float32Array::from_iter_values(rows.iter().flat_map(|r| r.electrons.iter().map(f))))
    };
    let codes: ArrayRef = Arc::new(Int32Array::from_iter_values(
        rows.iter().flat_map(|r| r.electrons.iter().map(|e| e.3)),
    ));
    let flags: ArrayRef = Arc::new(BooleanArray::from(
        rows.iter().flat_map(|r| r.electrons.iter().map(|e| e.4)).collect::<Vec<_>>(),
    ));

    let cols: Vec<(&str, ArrayRef)> = vec![
        ("run", Arc::new(Int32Array::from_iter_values(0..rows.len() as i32)) as ArrayRef),
        ("nElectron", Arc::new(Int32Array::from_iter_values(lengths.iter().map(|&n| n as i32))) as ArrayRef),
        ("Electron_pt", list(flat(|e| e.0), &lengths)),
        ("Electron_eta", list(flat(|e| e.1), &lengths)),
        ("Electron_phi", list(flat(|e| e.2), &lengths)),
        ("Electron_pdgId", list(codes, &lengths)),
        ("Electron_mvaFall17V2Iso_WP90", list(flags, &lengths)),
        ("PuppiMET_pt", Arc::new(Float32Array::from_iter_values(rows.iter().map(|r| r.met.0))) as ArrayRef),
        ("PuppiMET_phi", Arc::new(Float32Array::from_iter_values(rows.iter().map(|r| r.met.1))) as ArrayRef),
    ];
    RecordBatch::try_from_iter(cols.into_iter().filter(|(n, _)| !drop.contains(n))).unwrap()
}

fn write_nano(path: &Path, rows: &[Row], drop: &[&str]) {
    let batch = nano_batch(rows, drop);
    write_parquet_atomic(path, batch.schema(), &[batch]).unwrap();
}

fn dy_rows() -> Vec<Row> {
    vec![
        Row {
            electrons: vec![(45.0, 0.3, 0.0, 11, true), (44.0, -0.1, 3.0, -11, true)],
            met: (10.0, 0.5),
        },
        Row { electrons: vec![], met: (7.0, -1.0) },
        Row {
            electrons: vec![(30.0, 1.0, 1.0, -11, false), (60.0, 0.0, -2.0, 11, true)],
            met: (20.0, 2.5),
        },
    ]
}

fn column_names(path: &Path) -> Vec<String> {
    let (schema, _) = read_parquet(path).unwrap();
    schema.fields().iter().map(|f| f.name().clone()).collect()
}

fn f32_column(path: &Path, name: &str) -> Vec<f32> {
    let (_, batches) = read_parquet(path).unwrap();
    batches
        .iter()
        .flat_map(|b| {
            let col = b.column_by_name(name).unwrap();
            col.as_primitive::<Float32Type>().values().to_vec()
        })
        .collect()
}

#[test]
fn loads_events_from_nano_layout() {
    let dir = tmp_dir("load");
    let path = dir.join("dy.parquet");
    write_nano(&path, &dy_rows(), &[]);

    let table = EventTable::load(&[path], &ColumnNames::default(), 10).unwrap();
    assert_eq!(table.len(), 3);
    let ev = &table.events()[2];
    assert_eq!(ev.n_objects(), 2);
    assert!(!ev.objects()[0].id_pass);
    assert_eq!(ev.objects()[1].type_code, 11);
    assert_relative_eq!(ev.met().phi, 2.5);
}

#[test]
fn chained_shards_keep_order() {
    let dir = tmp_dir("chain");
    let a = dir.join("a.parquet");
    let b = dir.join("b.parquet");
    write_nano(&a, &dy_rows(), &[]);
    write_nano(&b, &dy_rows()[..1], &[]);

    let table = EventTable::load(&[a, b], &ColumnNames::default(), 10).unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(table.events()[3], table.events()[0]);
}

#[test]
fn missing_columns_are_all_named() {
    let dir = tmp_dir("missing");
    let path = dir.join("dy.parquet");
    write_nano(&path, &dy_rows(), &["PuppiMET_phi", "Electron_pdgId"]);

    let err: Error = EventTable::load(&[path], &ColumnNames::default(), 10).unwrap_err().into();
    match err {
        Error::MissingColumns(cols) => assert_eq!(cols, ["Electron_pdgId", "PuppiMET_phi"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn every_shard_schema_is_checked_before_decoding() {
    let dir = tmp_dir("missing_later");
    let a = dir.join("a.parquet");
    let b = dir.join("b.parquet");
    write_nano(&a, &dy_rows(), &[]);
    write_nano(&b, &dy_rows(), &["Electron_eta"]);

    let err: Error = EventTable::load(&[a, b], &ColumnNames::default(), 10).unwrap_err().into();
    match err {
        Error::MissingColumns(cols) => assert_eq!(cols, ["Electron_eta"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_file_is_a_resource_error() {
    let dir = tmp_dir("nofile");
    let err = EventTable::load(&[dir.join("none.parquet")], &ColumnNames::default(), 10).unwrap_err();
    assert!(matches!(err, StoreError::Core(Error::Resource(_))));
}

#[test]
fn derived_columns_are_appended() {
    let dir = tmp_dir("derive");
    let input = dir.join("dy.parquet");
    let output = dir.join("dy_projected.parquet");
    write_nano(&input, &dy_rows(), &[]);

    let summary = append_derived_columns(
        &input,
        Some(&output),
        &ColumnNames::default(),
        10,
        ProjectionReference::LeadingObjects,
    )
    .unwrap();
    assert_eq!(summary.rows, 3);
    assert!(summary.replaced.is_empty());

    let mut expected = column_names(&input);
    expected.extend(["delta_phi_1", "delta_phi_2", "delta_phi_min", "projected_MET"].map(String::from));
    assert_eq!(column_names(&output), expected);

    let d1 = f32_column(&output, "delta_phi_1");
    let d2 = f32_column(&output, "delta_phi_2");
    let dmin = f32_column(&output, "delta_phi_min");
    let pmet = f32_column(&output, "projected_MET");

    assert_relative_eq!(d1[0], 0.5, epsilon = 1e-6);
    assert_relative_eq!(d2[0], -2.5, epsilon = 1e-6);
    assert_relative_eq!(dmin[0], 0.5, epsilon = 1e-6);
    assert_relative_eq!(pmet[0], 10.0 * 0.5f32.sin(), epsilon = 1e-5);

    // no objects: zeros
    assert_eq!((d1[1], d2[1], dmin[1], pmet[1]), (0.0, 0.0, 0.0, 0.0));

    // leading is the 60 GeV object at phi -2; dphi = 4.5 - 2pi
    assert_relative_eq!(d1[2], (4.5 - std::f64::consts::TAU) as f32, epsilon = 1e-5);
    assert_relative_eq!(d2[2], 1.5, epsilon = 1e-6);
    assert_relative_eq!(pmet[2], 20.0 * 1.5f32.sin(), epsilon = 1e-4);

    // input untouched
    assert_eq!(column_names(&input).len(), 9);
}

#[test]
fn rerun_in_place_replaces_derived_columns() {
    let dir = tmp_dir("rerun");
    let path = dir.join("dy.parquet");
    write_nano(&path, &dy_rows(), &[]);
    let names = ColumnNames::default();

    append_derived_columns(&path, None, &names, 10, ProjectionReference::LeadingObjects).unwrap();
    let first = f32_column(&path, "delta_phi_min");
    let summary =
        append_derived_columns(&path, None, &names, 10, ProjectionReference::IdentifiedObjects)
            .unwrap();
    assert_eq!(summary.replaced.len(), 4);

    let cols = column_names(&path);
    assert_eq!(cols.len(), 13);
    assert_eq!(cols.iter().filter(|c| *c == "projected_MET").count(), 1);

    // row 2 has one identified object only
    let second = f32_column(&path, "delta_phi_min");
    assert_eq!(first[0], second[0]);
    assert_eq!(f32_column(&path, "delta_phi_2")[2], 0.0);
}

#[test]
fn empty_table_gets_schema_only_output() {
    let dir = tmp_dir("empty");
    let input = dir.join("empty.parquet");
    let output = dir.join("empty_projected.parquet");
    write_nano(&input, &[], &[]);

    let summary = append_derived_columns(
        &input,
        Some(&output),
        &ColumnNames::default(),
        10,
        ProjectionReference::default(),
    )
    .unwrap();
    assert_eq!(summary.rows, 0);
    assert!(column_names(&output).contains(&"projected_MET".to_string()));
}

#[test]
fn extraction_concatenates_shards() {
    let dir = tmp_dir("extract");
    let a = dir.join("a.parquet");
    let b = dir.join("b.parquet");
    let out = dir.join("slim.parquet");
    write_nano(&a, &dy_rows(), &[]);
    write_nano(&b, &dy_rows()[..2], &[]);

    let keep: Vec<String> =
        ["PuppiMET_pt", "nElectron", "Muon_pt"].iter().map(|s| s.to_string()).collect();
    let summary = extract_columns(&[a, b], &keep, &out).unwrap();
    assert_eq!(summary.kept, ["nElectron", "PuppiMET_pt"]);
    assert_eq!(summary.skipped, ["Muon_pt"]);
    assert_eq!(summary.rows, 5);

    assert_eq!(column_names(&out), ["nElectron", "PuppiMET_pt"]);
    assert_eq!(f32_column(&out, "PuppiMET_pt"), vec![10.0, 7.0, 20.0, 10.0, 7.0]);
}

#[test]
fn extraction_fails_when_later_shard_lacks_column() {
    let dir = tmp_dir("extract_bad");
    let a = dir.join("a.parquet");
    let b = dir.join("b.parquet");
    let out = dir.join("slim.parquet");
    write_nano(&a, &dy_rows(), &[]);
    write_nano(&b, &dy_rows(), &["PuppiMET_pt"]);

    let keep = vec!["PuppiMET_pt".to_string()];
    let err = extract_columns(&[a, b.clone()], &keep, &out).unwrap_err();
    assert!(err.to_string().contains("PuppiMET_pt"));
    assert!(!out.exists());
}

#[test]
fn extraction_of_only_unknown_columns_says_why() {
    let dir = tmp_dir("extract_none");
    let a = dir.join("a.parquet");
    let out = dir.join("slim.parquet");
    write_nano(&a, &dy_rows(), &[]);

    let err = extract_columns(&[a], &["Muon_pt".to_string()], &out).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("none of the requested columns exist"), "{msg}");
    assert!(msg.contains("at least one column"), "{msg}");
    assert!(!out.exists());
}

#[test]
fn inspection_reports_types() {
    let dir = tmp_dir("inspect");
    let path = dir.join("dy.parquet");
    write_nano(&path, &dy_rows(), &[]);

    let names: Vec<String> = ["PuppiMET_pt", "Muon_pt"].iter().map(|s| s.to_string()).collect();
    let info = inspect_columns(&path, &names).unwrap();
    assert_eq!(info[0].to_string(), "Column: PuppiMET_pt, Type: Float32");
    assert_eq!(info[1].to_string(), "Column: Muon_pt not found!");
}
