//! Record sources: the `RecordSource` seam plus a local export reader

use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use serde::Deserialize;

use crate::entity::Entity;
use crate::error::SourceError;
use crate::query::Query;

/// Lazy stream of entities matching a query
pub type EntityIter<'a> = Box<dyn Iterator<Item = Result<Entity, SourceError>> + 'a>;

/// Producer of entities for a query.
///
/// Implementations only yield entities matching the query; errors are
/// returned in-stream and are never retried by the pipeline.
pub trait RecordSource {
    fn entities<'a>(&'a self, query: &Query) -> Result<EntityIter<'a>, SourceError>;
}

/// Line format of an export file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Datastore REST entities with typed property values
    #[default]
    Datastore,
    /// One plain JSON object per line, used as the property record
    Json,
}

/// Newline-delimited entity export on disk (`.gz` is decompressed, `-` is stdin)
#[derive(Debug, Clone)]
pub struct ExportSource {
    path: PathBuf,
    format: InputFormat,
}

impl ExportSource {
    /// Open an export file, failing early if it does not exist
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if !is_stdin(&path) {
            std::fs::metadata(&path)?;
        }
        Ok(Self {
            path,
            format: InputFormat::default(),
        })
    }

    pub fn with_format(mut self, format: InputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for ExportSource {
    fn entities<'a>(&'a self, query: &Query) -> Result<EntityIter<'a>, SourceError> {
        let reader = open_reader(&self.path)?;
        log::debug!(
            "Reading {:?} export from {}",
            self.format,
            self.path.display()
        );

        let query = query.clone();
        let lines = ExportLines {
            lines: reader.lines(),
            line_no: 0,
            format: self.format,
        };
        Ok(Box::new(lines.filter(move |item| match item {
            Ok(entity) => query.matches(entity.key.as_ref()),
            Err(_) => true,
        })))
    }
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn open_reader(path: &Path) -> io::Result<Box<dyn BufRead>> {
    if is_stdin(path) {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

struct ExportLines {
    lines: Lines<Box<dyn BufRead>>,
    line_no: usize,
    format: InputFormat,
}

impl ExportLines {
    fn decode(&self, line: &str) -> Result<Entity, SourceError> {
        serde_json::from_str(line)
            .map_err(|e| e.to_string())
            .and_then(|json| match self.format {
                InputFormat::Datastore => Entity::from_datastore_json(json),
                InputFormat::Json => Entity::from_plain_json(json),
            })
            .map_err(|message| SourceError::Decode {
                line: self.line_no,
                message,
            })
    }
}

impl Iterator for ExportLines {
    type Item = Result<Entity, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(SourceError::Io(e))),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(self.decode(&line));
        }
    }
}

/// In-memory source, filtered by the query like any other
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    pub entities: Vec<Entity>,
}

impl VecSource {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }
}

impl RecordSource for VecSource {
    fn entities<'a>(&'a self, query: &Query) -> Result<EntityIter<'a>, SourceError> {
        let query = query.clone();
        Ok(Box::new(
            self.entities
                .iter()
                .filter(move |e| query.matches(e.key.as_ref()))
                .cloned()
                .map(Ok),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const EXPORT: &str = r#"{"key": {"partitionId": {"projectId": "p"}, "path": [{"kind": "User", "name": "a"}]}, "properties": {"n": {"integerValue": "1"}}}
{"key": {"partitionId": {"projectId": "p"}, "path": [{"kind": "Order", "id": "9"}]}, "properties": {"n": {"integerValue": "2"}}}

{"key": {"partitionId": {"projectId": "p"}, "path": [{"kind": "User", "name": "b"}]}, "properties": {"n": {"integerValue": "3"}}}
"#;

    fn user_query() -> Query {
        Query::new("User", "p", None).unwrap()
    }

    fn collect(source: &impl RecordSource, query: &Query) -> Vec<Result<Entity, SourceError>> {
        source.entities(query).unwrap().collect()
    }

    #[test]
    fn reads_and_filters_by_kind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.jsonl");
        std::fs::write(&path, EXPORT).unwrap();

        let source = ExportSource::open(&path).unwrap();
        let entities: Vec<Entity> = collect(&source, &user_query())
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(entities.len(), 2);
        let names: Vec<_> = entities
            .iter()
            .map(|e| e.key.as_ref().unwrap().path[0].name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn reads_gzip_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.jsonl.gz");
        let mut gz = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        gz.write_all(EXPORT.as_bytes()).unwrap();
        gz.finish().unwrap();

        let source = ExportSource::open(&path).unwrap();
        assert_eq!(collect(&source, &user_query()).len(), 2);
    }

    #[test]
    fn decode_error_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"properties\": {}}\n\nnot json\n").unwrap();

        let source = ExportSource::open(&path).unwrap();
        let items = collect(&source, &user_query());
        assert!(items[0].is_ok());
        match &items[1] {
            Err(SourceError::Decode { line, .. }) => assert_eq!(*line, 3),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn plain_json_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.jsonl");
        std::fs::write(&path, "{\"b\": 1, \"a\": \"x\"}\n{\"c\": null}\n").unwrap();

        let source = ExportSource::open(&path)
            .unwrap()
            .with_format(InputFormat::Json);
        let entities: Vec<Entity> = collect(&source, &user_query())
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(entities.len(), 2);
        let keys: Vec<_> = entities[0].properties.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn missing_file_fails_on_open() {
        let dir = TempDir::new().unwrap();
        let err = ExportSource::open(dir.path().join("nope.jsonl")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn vec_source_filters() {
        let json = |kind: &str| {
            Entity::from_datastore_json(serde_json::json!({
                "key": {"path": [{"kind": kind, "id": "1"}]},
                "properties": {}
            }))
            .unwrap()
        };
        let source = VecSource::new(vec![json("User"), json("Order"), json("User")]);
        assert_eq!(collect(&source, &user_query()).len(), 2);
    }
}
