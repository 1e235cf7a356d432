//! Output sinks: sharded text files and an in-memory collector

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Consumer of serialized fragments.
///
/// `write` is called once per fragment in pipeline order; `finish` is called
/// once at the end to flush and publish the output, and returns the number of
/// fragments written.
pub trait RecordSink {
    fn write(&mut self, fragment: &str) -> io::Result<()>;

    fn finish(&mut self) -> io::Result<usize>;
}

/// Settings for [`TextShardSink`]
#[derive(Debug, Clone)]
pub struct TextSinkConfig {
    /// Path prefix; shard files are `{prefix}-SSSSS-of-NNNNN{suffix}`
    pub prefix: PathBuf,
    pub num_shards: usize,
    pub suffix: String,
    /// Written as the first line of every shard, skipped when empty
    pub header: String,
}

impl TextSinkConfig {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            num_shards: 1,
            suffix: String::new(),
            header: String::new(),
        }
    }

    /// Final path of shard `idx`
    pub fn shard_path(&self, idx: usize) -> PathBuf {
        let mut name: OsString = self.prefix.clone().into_os_string();
        name.push(format!(
            "-{idx:05}-of-{:05}{}",
            self.num_shards, self.suffix
        ));
        PathBuf::from(name)
    }

    /// All final shard paths, in shard order
    pub fn shard_paths(&self) -> Vec<PathBuf> {
        (0..self.num_shards).map(|i| self.shard_path(i)).collect()
    }
}

struct ShardFile {
    writer: BufWriter<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    lines: usize,
}

impl ShardFile {
    fn create(final_path: PathBuf, header: &str) -> io::Result<Self> {
        let mut tmp = final_path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp_path = PathBuf::from(tmp);

        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        if !header.is_empty() {
            writer.write_all(header.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        Ok(Self {
            writer,
            tmp_path,
            final_path,
            lines: 0,
        })
    }

    fn finalize(self) -> io::Result<usize> {
        let file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(self.lines)
    }
}

/// Text sink spreading fragments round-robin over a fixed number of shards.
///
/// Every shard is written to a `.tmp` file and renamed into place by
/// [`finish`](RecordSink::finish); a run that never finishes leaves no
/// final files behind.
pub struct TextShardSink {
    shards: Vec<ShardFile>,
    next: usize,
    written: usize,
}

impl std::fmt::Debug for TextShardSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextShardSink")
            .field("shards", &self.shards.len())
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl TextShardSink {
    /// Create all shard files (header included) up front
    pub fn create(config: &TextSinkConfig) -> io::Result<Self> {
        if config.num_shards == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "number of shards must be at least 1",
            ));
        }

        if let Some(parent) = config.prefix.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        cleanup_tmp_shards(&config.prefix)?;

        let shards = config
            .shard_paths()
            .into_iter()
            .map(|path| ShardFile::create(path, &config.header))
            .collect::<io::Result<Vec<_>>>()?;

        log::debug!(
            "Opened {} shard(s) at {}",
            shards.len(),
            config.prefix.display()
        );
        Ok(Self {
            shards,
            next: 0,
            written: 0,
        })
    }
}

impl RecordSink for TextShardSink {
    fn write(&mut self, fragment: &str) -> io::Result<()> {
        let Some(shard) = self.shards.get_mut(self.next) else {
            return Err(io::Error::other("sink already finished"));
        };
        shard.writer.write_all(fragment.as_bytes())?;
        shard.writer.write_all(b"\n")?;
        shard.lines += 1;
        self.next = (self.next + 1) % self.shards.len();
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<usize> {
        for shard in std::mem::take(&mut self.shards) {
            let path = shard.final_path.clone();
            let lines = shard.finalize()?;
            log::debug!("{}: {lines} fragments", path.display());
        }
        Ok(self.written)
    }
}

/// Remove stale shard `.tmp` files left behind for this prefix
pub fn cleanup_tmp_shards(prefix: &Path) -> io::Result<()> {
    let pattern = format!(
        "{}-*-of-*.tmp",
        glob::Pattern::escape(&prefix.to_string_lossy())
    );
    let paths = glob::glob(&pattern)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    for path in paths.filter_map(Result::ok) {
        log::warn!("Removing stale tmp file: {}", path.display());
        fs::remove_file(&path)?;
    }
    Ok(())
}

/// Sink that keeps fragments in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub fragments: Vec<String>,
}

impl RecordSink for MemorySink {
    fn write(&mut self, fragment: &str) -> io::Result<()> {
        self.fragments.push(fragment.to_string());
        Ok(())
    }

    fn finish(&mut self) -> io::Result<usize> {
        Ok(self.fragments.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir, shards: usize, header: &str) -> TextSinkConfig {
        TextSinkConfig {
            prefix: dir.path().join("out/users"),
            num_shards: shards,
            suffix: ".xml".to_string(),
            header: header.to_string(),
        }
    }

    #[test]
    fn shard_naming() {
        let cfg = TextSinkConfig {
            num_shards: 3,
            ..TextSinkConfig::new("gs/out")
        };
        assert_eq!(cfg.shard_path(0), PathBuf::from("gs/out-00000-of-00003"));
        assert_eq!(cfg.shard_paths().len(), 3);
    }

    #[test]
    fn single_shard_with_header() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 1, "<HEADER>");
        let mut sink = TextShardSink::create(&cfg).unwrap();
        sink.write("<User><a>1</a></User>").unwrap();
        sink.write("<User><a>2</a></User>").unwrap();
        assert_eq!(sink.finish().unwrap(), 2);

        let text = fs::read_to_string(cfg.shard_path(0)).unwrap();
        assert_eq!(
            text,
            "<HEADER>\n<User><a>1</a></User>\n<User><a>2</a></User>\n"
        );
    }

    #[test]
    fn round_robin_across_shards() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 3, "H");
        let mut sink = TextShardSink::create(&cfg).unwrap();
        for f in ["a", "b", "c", "d"] {
            sink.write(f).unwrap();
        }
        sink.finish().unwrap();

        let read = |i| fs::read_to_string(cfg.shard_path(i)).unwrap();
        assert_eq!(read(0), "H\na\nd\n");
        assert_eq!(read(1), "H\nb\n");
        assert_eq!(read(2), "H\nc\n");
    }

    #[test]
    fn shard_without_fragments_still_has_header() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 2, "H");
        let mut sink = TextShardSink::create(&cfg).unwrap();
        sink.write("x").unwrap();
        sink.finish().unwrap();
        assert_eq!(fs::read_to_string(cfg.shard_path(0)).unwrap(), "H\nx\n");
        assert_eq!(fs::read_to_string(cfg.shard_path(1)).unwrap(), "H\n");
    }

    #[test]
    fn write_after_finish_fails() {
        let dir = TempDir::new().unwrap();
        let mut sink = TextShardSink::create(&config(&dir, 1, "")).unwrap();
        sink.finish().unwrap();
        assert!(sink.write("late").is_err());
    }

    #[test]
    fn empty_header_not_written() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 1, "");
        let mut sink = TextShardSink::create(&cfg).unwrap();
        sink.write("x").unwrap();
        sink.finish().unwrap();
        assert_eq!(fs::read_to_string(cfg.shard_path(0)).unwrap(), "x\n");
    }

    #[test]
    fn unfinished_sink_leaves_only_tmp() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 1, "H");
        let mut sink = TextShardSink::create(&cfg).unwrap();
        sink.write("x").unwrap();
        drop(sink);
        assert!(!cfg.shard_path(0).exists());

        // Reopening clears the stale tmp file before writing fresh ones
        let mut sink = TextShardSink::create(&cfg).unwrap();
        sink.finish().unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("out"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
        assert_eq!(fs::read_to_string(cfg.shard_path(0)).unwrap(), "H\n");
    }

    #[test]
    fn zero_shards_rejected() {
        let dir = TempDir::new().unwrap();
        let err = TextShardSink::create(&config(&dir, 0, "")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn cleanup_leaves_other_prefixes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a-00000-of-00001.tmp"), b"stale").unwrap();
        std::fs::write(dir.path().join("b-00000-of-00001.tmp"), b"other").unwrap();

        cleanup_tmp_shards(&dir.path().join("a")).unwrap();

        assert!(!dir.path().join("a-00000-of-00001.tmp").exists());
        assert!(dir.path().join("b-00000-of-00001.tmp").exists());
    }

    #[test]
    fn memory_sink_collects() {
        let mut sink = MemorySink::default();
        sink.write("a").unwrap();
        sink.write("b").unwrap();
        assert_eq!(sink.fragments, vec!["a", "b"]);
        assert_eq!(sink.finish().unwrap(), 2);
    }
}
