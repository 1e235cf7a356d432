//! End-to-end: export file → pipeline → sharded text output

use std::fs;
use std::path::Path;

use kindxml_core::{TextShardSink, TextSinkConfig};
use kindxml_datastore::{Config, ErrorPolicy, ExportSource, Pipeline, Query};
use tempfile::TempDir;

const EXPORT: &str = concat!(
    r#"{"key": {"partitionId": {"projectId": "shop"}, "path": [{"kind": "User", "name": "ada"}]}, "properties": {"name": {"stringValue": "Ada"}, "age": {"integerValue": "36"}, "tags": {"arrayValue": {"values": [{"stringValue": "admin"}, {"stringValue": "ops"}]}}}}"#,
    "\n",
    r#"{"key": {"partitionId": {"projectId": "shop"}, "path": [{"kind": "Order", "id": "7"}]}, "properties": {"total": {"doubleValue": 9.5}}}"#,
    "\n",
    r#"{"key": {"partitionId": {"projectId": "shop"}, "path": [{"kind": "User", "name": "bob"}]}, "properties": {"name": {"stringValue": "Bob & Co"}, "avatar": {"blobValue": "AAEC"}}}"#,
    "\n",
    r#"{"key": {"partitionId": {"projectId": "shop"}, "path": [{"kind": "User", "name": "cy"}]}, "properties": {"name": {"stringValue": "Cy"}, "active": {"booleanValue": true}, "address": {"entityValue": {"properties": {"city": {"stringValue": "Oslo"}}}}}}"#,
    "\n",
);

fn write_export(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("export.jsonl");
    fs::write(&path, EXPORT).unwrap();
    path
}

fn compact(on_error: ErrorPolicy) -> Config {
    Config {
        indent: String::new(),
        workers: 2,
        on_error,
        ..Default::default()
    }
}

fn sink_config(dir: &Path, num_shards: usize) -> TextSinkConfig {
    TextSinkConfig {
        num_shards,
        suffix: ".xml".into(),
        header: "<HEADER>".into(),
        ..TextSinkConfig::new(dir.join("out/users"))
    }
}

#[test]
fn skip_policy_writes_good_records_to_shards() {
    let dir = TempDir::new().unwrap();
    let source = ExportSource::open(write_export(dir.path())).unwrap();
    let query = Query::new("User", "shop", None).unwrap();
    let sink_config = sink_config(dir.path(), 2);
    let mut sink = TextShardSink::create(&sink_config).unwrap();

    let summary = Pipeline::new(&compact(ErrorPolicy::Skip))
        .unwrap()
        .run(&query, &source, &mut sink)
        .unwrap();

    assert_eq!(summary.records_read, 3);
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.records_skipped, 1);

    let paths = sink_config.shard_paths();
    assert!(paths[0].ends_with("users-00000-of-00002.xml"));
    let first = fs::read_to_string(&paths[0]).unwrap();
    let second = fs::read_to_string(&paths[1]).unwrap();
    assert_eq!(
        first,
        "<HEADER>\n<User><name>Ada</name><age>36</age><tags>admin</tags><tags>ops</tags></User>\n"
    );
    assert_eq!(
        second,
        "<HEADER>\n<User><name>Cy</name><active>true</active><address><city>Oslo</city></address></User>\n"
    );

    let leftovers = fs::read_dir(dir.path().join("out"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn fail_policy_leaves_no_final_shards() {
    let dir = TempDir::new().unwrap();
    let source = ExportSource::open(write_export(dir.path())).unwrap();
    let query = Query::new("User", "shop", None).unwrap();
    let sink_config = sink_config(dir.path(), 1);
    let mut sink = TextShardSink::create(&sink_config).unwrap();

    let err = Pipeline::new(&compact(ErrorPolicy::Fail))
        .unwrap()
        .run(&query, &source, &mut sink)
        .unwrap_err();

    assert!(format!("{err:#}").contains("avatar"));
    assert!(!sink_config.shard_path(0).exists());
}

#[test]
fn pretty_output_and_empty_shards_keep_header() {
    let dir = TempDir::new().unwrap();
    let source = ExportSource::open(write_export(dir.path())).unwrap();
    let query = Query::new("Order", "shop", None).unwrap();
    let sink_config = sink_config(dir.path(), 3);
    let mut sink = TextShardSink::create(&sink_config).unwrap();

    let config = Config {
        root_tag: "Order".into(),
        workers: 1,
        ..Default::default()
    };
    let summary = Pipeline::new(&config)
        .unwrap()
        .run(&query, &source, &mut sink)
        .unwrap();
    assert_eq!(summary.records_written, 1);

    let contents: Vec<String> = sink_config
        .shard_paths()
        .iter()
        .map(|p| fs::read_to_string(p).unwrap())
        .collect();
    assert_eq!(contents[0], "<HEADER>\n<Order>\n  <total>9.5</total>\n</Order>\n");
    assert_eq!(contents[1], "<HEADER>\n");
    assert_eq!(contents[2], "<HEADER>\n");
}

#[test]
fn other_project_is_filtered_out() {
    let dir = TempDir::new().unwrap();
    let source = ExportSource::open(write_export(dir.path())).unwrap();
    let query = Query::new("User", "elsewhere", None).unwrap();
    let mut sink = kindxml_core::MemorySink::default();

    let summary = Pipeline::new(&compact(ErrorPolicy::Fail))
        .unwrap()
        .run(&query, &source, &mut sink)
        .unwrap();
    assert_eq!(summary.records_read, 0);
}
