//! MP3 concatenation through an `ffmpeg` subprocess
//!
//! Chunks are written to a scratch directory and joined with the concat
//! demuxer (`-f concat -safe 0 -c copy`), so no re-encoding happens.

use super::{AudioStitcher, ServiceError, ServiceResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

pub struct FfmpegStitcher {
    ffmpeg_path: PathBuf,
}

impl FfmpegStitcher {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self { ffmpeg_path }
    }
}

/// Concat demuxer list file contents
fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", p.display().to_string().replace('\'', "'\\''")))
        .collect()
}

async fn write_chunks(dir: &Path, chunks: &[Vec<u8>]) -> ServiceResult<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let path = dir.join(format!("chunk-{:04}.mp3", i));
        tokio::fs::write(&path, chunk).await?;
        paths.push(path);
    }
    Ok(paths)
}

#[async_trait]
impl AudioStitcher for FfmpegStitcher {
    async fn stitch(&self, mut chunks: Vec<Vec<u8>>) -> ServiceResult<Vec<u8>> {
        match chunks.len() {
            0 => return Err(ServiceError::Ffmpeg("no audio chunks to stitch".into())),
            1 => return Ok(chunks.remove(0)),
            _ => {}
        }

        let scratch = tempfile::tempdir()?;
        let paths = write_chunks(scratch.path(), &chunks).await?;

        let list_path = scratch.path().join("chunks.txt");
        tokio::fs::write(&list_path, concat_list(&paths)).await?;
        let output_path = scratch.path().join("stitched.mp3");

        debug!(chunks = chunks.len(), "Stitching audio with ffmpeg");

        let output = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(&list_path)
            .args(["-c", "copy"])
            .arg(&output_path)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ServiceError::Ffmpeg(stderr));
        }

        Ok(tokio::fs::read(&output_path).await?)
    }
}
