// SPDX-License-Identifier: Apache-2.0

use flate2::read::GzDecoder;
use metagenome_core::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStdout};
use std::thread::JoinHandle;

/// Streaming view over index lines, without trailing newlines.
pub enum LineSource {
    Gzip(std::io::Lines<BufReader<GzDecoder<File>>>),
    Memory(std::vec::IntoIter<String>),
    Process(ProcessLines),
}

impl LineSource {
    pub fn gzip(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::io(format!("failed to open {}: {e}", path.display())))?;
        Ok(Self::Gzip(BufReader::new(GzDecoder::new(file)).lines()))
    }

    #[must_use]
    pub fn memory(lines: Vec<String>) -> Self {
        Self::Memory(lines.into_iter())
    }
}

impl Iterator for LineSource {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Gzip(lines) => lines.next().map(|r| r.map_err(Error::from)),
            Self::Memory(lines) => lines.next().map(Ok),
            Self::Process(p) => p.next(),
        }
    }
}

/// Stdout of a sort subprocess. The exit status is checked at end of stream
/// so a failed sort surfaces as an error instead of a short result.
pub struct ProcessLines {
    child: Child,
    lines: std::io::Lines<BufReader<ChildStdout>>,
    feeder: Option<JoinHandle<Result<()>>>,
    finished: bool,
}

impl ProcessLines {
    pub(crate) fn new(
        mut child: Child,
        feeder: Option<JoinHandle<Result<()>>>,
    ) -> Result<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::internal("sort subprocess has no stdout"))?;
        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
            feeder,
            finished: false,
        })
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| Error::io(format!("failed to wait for sort: {e}")))?;
        let fed = match self.feeder.take() {
            Some(feeder) => feeder
                .join()
                .map_err(|_| Error::internal("sort input feeder panicked"))?,
            None => Ok(()),
        };
        // A sort that exits early breaks the feeder's pipe; report the exit.
        if !status.success() {
            return Err(Error::internal(format!("external sort exited with {status}")));
        }
        fed
    }
}

impl Iterator for ProcessLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.lines.next() {
            Some(Ok(line)) => Some(Ok(line)),
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(Error::from(e)))
            }
            None => match self.finish() {
                Ok(()) => None,
                Err(e) => Some(Err(e)),
            },
        }
    }
}

impl Drop for ProcessLines {
    fn drop(&mut self) {
        if !self.finished {
            // Abandoned early (page filled under a known total).
            let _ = self.child.kill();
            let _ = self.child.wait();
            if let Some(feeder) = self.feeder.take() {
                let _ = feeder.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn gzip_source_strips_newlines() {
        let dir = tempfile::tempdir().expect("tmp");
        let path = dir.path().join("x.tsv.gz");
        let mut enc = GzEncoder::new(File::create(&path).expect("create"), Compression::default());
        enc.write_all(b"a\t1\nb\t2\n").expect("write");
        enc.finish().expect("finish");
        let lines: Vec<String> = LineSource::gzip(&path)
            .expect("open")
            .collect::<Result<_>>()
            .expect("lines");
        assert_eq!(lines, vec!["a\t1".to_string(), "b\t2".to_string()]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = LineSource::gzip(Path::new("/nonexistent/x.tsv.gz"))
            .err()
            .expect("missing");
        assert_eq!(err.code, metagenome_core::ErrorCode::Io);
    }
}
