//! Writing generated images to disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use imagegen_core::history::download_filename;
use imagegen_core::image_data::decode_image;
use imagegen_core::HistoryRecord;
use imagegen_pipeline::BatchJob;

/// Decode every successful image of `job` and write it under `out_dir`.
///
/// Filenames come from the matching history record when one is available.
/// Images that fail to decode are logged and skipped.
pub async fn write_images(
    job: &BatchJob,
    history: &[HistoryRecord],
    out_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let by_id: HashMap<&str, &HistoryRecord> =
        history.iter().map(|r| (r.id.as_str(), r)).collect();
    let mut written = Vec::new();

    for (index, request, image_base64) in job.successes() {
        let image = match decode_image(image_base64) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping undecodable image");
                continue;
            }
        };

        let record = job.history_ids[index]
            .as_deref()
            .and_then(|id| by_id.get(id));
        let filename = match record {
            Some(record) => record.download_filename(image.extension()),
            None => download_filename(
                request.archetype(),
                request.title(),
                request.prompt_text(),
                image.extension(),
                Utc::now().timestamp_millis(),
            ),
        };

        let path = unique_path(out_dir, &filename, index);
        tokio::fs::write(&path, &image.bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        tracing::info!(
            index,
            path = %path.display(),
            width = image.width,
            height = image.height,
            "Image saved",
        );
        written.push(path);
    }

    Ok(written)
}

/// `out_dir/filename`, or the first free `<stem>-<index>[-<n>].<ext>` if
/// that is taken. Existing files are never overwritten.
fn unique_path(out_dir: &Path, filename: &str, index: usize) -> PathBuf {
    let path = out_dir.join(filename);
    if !path.exists() {
        return path;
    }
    let (stem, ext) = filename.rsplit_once('.').unwrap_or((filename, ""));
    let mut candidate = out_dir.join(format!("{stem}-{index}.{ext}"));
    let mut n = 1;
    while candidate.exists() {
        n += 1;
        candidate = out_dir.join(format!("{stem}-{index}-{n}.{ext}"));
    }
    candidate
}
