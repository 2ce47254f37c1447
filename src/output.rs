use anyhow::anyhow;
use formatx::formatx;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

pub trait Output: Debug {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write>;
    /// Whether this output can be considered a no-op and therefore that any code that only writes to the output can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Writes each location key to its own file in a directory. The file template takes two
/// placeholders, the location key and the file extension, e.g. `"survey__{}.{}"`.
#[derive(Debug)]
pub struct FileOutput {
    directory_path: PathBuf,
    file_template: String,
}

impl FileOutput {
    pub fn new(directory_path: PathBuf, file_template: String) -> Self {
        Self {
            directory_path,
            file_template,
        }
    }

    fn file_name(&self, location_key: &str, file_extension: &str) -> anyhow::Result<String> {
        formatx!(&self.file_template, location_key, file_extension).map_err(|error| {
            anyhow!(
                "Output file template '{}' could not be applied: {error:?}",
                self.file_template
            )
        })
    }
}

impl Output for FileOutput {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        Ok(BufWriter::new(File::create(
            self.directory_path
                .join(self.file_name(location_key, file_extension)?),
        )?))
    }
}

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_location_key(
        &self,
        _location_key: &str,
        _file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Keeps every "file" in memory, keyed by `{location_key}.{file_extension}`, so that callers
/// embedding the engine (or tests) can read outputs back without touching the filesystem.
#[derive(Clone, Debug, Default)]
pub struct MemoryOutput(Arc<Mutex<IndexMap<String, Vec<u8>>>>);

impl MemoryOutput {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.0.lock().keys().cloned().collect()
    }

    pub fn contents(&self, file_name: &str) -> Option<String> {
        self.0
            .lock()
            .get(file_name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl Output for MemoryOutput {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        let file_name = format!("{location_key}.{file_extension}");
        // a new writer for the same key starts the file afresh
        self.0.lock().insert(file_name.clone(), vec![]);

        Ok(MemoryFileWriter {
            files: self.0.clone(),
            file_name,
        })
    }
}

impl Output for &MemoryOutput {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        <MemoryOutput as Output>::writer_for_location_key(self, location_key, file_extension)
    }
}

struct MemoryFileWriter {
    files: Arc<Mutex<IndexMap<String, Vec<u8>>>>,
    file_name: String,
}

impl Write for MemoryFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.files
            .lock()
            .entry(self.file_name.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn should_collect_writes_per_file() {
        let output = MemoryOutput::new();

        {
            let mut writer = output.writer_for_location_key("room_heat_loss", "csv").unwrap();
            writer.write_all(b"room_id\n").unwrap();
            writer.write_all(b"living\n").unwrap();
        }
        {
            let mut writer = output.writer_for_location_key("provenance", "json").unwrap();
            writer.write_all(b"[]").unwrap();
        }

        assert_eq!(
            output.file_names(),
            vec!["room_heat_loss.csv", "provenance.json"]
        );
        assert_eq!(
            output.contents("room_heat_loss.csv"),
            Some("room_id\nliving\n".to_string())
        );
        assert_eq!(output.contents("missing.csv"), None);
    }

    #[rstest]
    fn should_restart_file_written_twice() {
        let output = MemoryOutput::new();

        for contents in ["first", "second"] {
            let mut writer = output.writer_for_location_key("provenance", "json").unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }

        assert_eq!(
            output.contents("provenance.json"),
            Some("second".to_string())
        );
    }

    #[rstest]
    fn should_name_files_from_template() {
        let output = FileOutput::new(PathBuf::from("out"), "survey__{}.{}".to_string());

        assert_eq!(
            output.file_name("room_heat_loss", "csv").unwrap(),
            "survey__room_heat_loss.csv"
        );
    }

    #[rstest]
    fn sink_output_should_be_noop() {
        assert!(SinkOutput.is_noop());
        assert!(!MemoryOutput::new().is_noop());
    }
}
