use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sitepipe::errors::TransformError;
use sitepipe::fileset::SourceFile;
use sitepipe::transform::{Artifact, Artifacts, OutputFile, Transform, TransformInput};
use sitepipe::types::Mode;

/// Transform that copies each source prefixed with a marker, counts its
/// invocations and can be told to fail on one file name.
#[derive(Debug, Clone)]
pub struct RecordingTransform {
    marker: String,
    calls: Arc<AtomicUsize>,
    fail_on: Option<String>,
    delay: Duration,
}

impl RecordingTransform {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            fail_on: None,
            delay: Duration::ZERO,
        }
    }

    /// Sources with this file name produce `MalformedInput`.
    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.fail_on = Some(file_name.to_string());
        self
    }

    /// Sleep this long before producing anything.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn into_transform(self) -> Arc<dyn Transform> {
        Arc::new(self)
    }
}

impl Transform for RecordingTransform {
    fn name(&self) -> &str {
        "recording"
    }

    fn apply<'a>(&'a self, input: TransformInput<'a>) -> Artifacts<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let fs = input.fs;
        Box::new(input.sources.into_iter().map(move |src| {
            let name = src.path.file_name().map(|n| n.to_string_lossy().into_owned());
            if name.is_some() && name == self.fail_on {
                return Err(TransformError::malformed(&src.path, "refused by test"));
            }
            let mut bytes = self.marker.as_bytes().to_vec();
            bytes.extend(fs.read(&src.path).map_err(|e| TransformError::read(&src.path, e))?);
            Ok(Artifact::File(OutputFile::new(src.relative, bytes)))
        }))
    }

    fn planned_outputs(&self, sources: &[SourceFile], _mode: Mode) -> Vec<PathBuf> {
        sources.iter().map(|s| s.relative.clone()).collect()
    }
}
