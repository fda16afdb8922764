//! Report artifact sinks.
//!
//! Each executed stage writes exactly one artifact through a [`ReportSink`].
//! The sink is a collaborator: the core only needs to name the output
//! location deterministically before a stage runs and to hand over the
//! content afterwards. Sink failures are fatal to the pipeline — a missing
//! report breaks the build contract.

use async_trait::async_trait;
use std::path::Path;

use crate::stage::ReportFormat;

/// Destination for stage report artifacts.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn write(
        &self,
        stage_id: &str,
        format: ReportFormat,
        path: &Path,
        contents: &[u8],
    ) -> anyhow::Result<()>;
}

/// Sink that writes artifacts to the filesystem, creating parent
/// directories as needed.
pub struct FsReportSink;

#[async_trait]
impl ReportSink for FsReportSink {
    async fn write(
        &self,
        _stage_id: &str,
        _format: ReportFormat,
        path: &Path,
        contents: &[u8],
    ) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_sink_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("style_check").join("style_check.html");

        FsReportSink
            .write("style_check", ReportFormat::Html, &path, b"<html/>")
            .await
            .expect("write failed");

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, b"<html/>");
    }

    #[tokio::test]
    async fn test_fs_sink_overwrites_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test").join("test.xml");

        FsReportSink
            .write("test", ReportFormat::Xml, &path, b"first")
            .await
            .unwrap();
        FsReportSink
            .write("test", ReportFormat::Xml, &path, b"second")
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }
}
