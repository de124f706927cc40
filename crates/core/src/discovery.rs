use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::{
    error::{RazmetkaError, Result},
    naming::ResultNaming,
};

/// Metadata files in `input_dir` that have no result in `output_dir` yet.
///
/// Creates `output_dir` if it does not exist. The listing is not recursive
/// and is sorted by path.
pub async fn find_pending(
    input_dir: &Path,
    output_dir: &Path,
    naming: &ResultNaming,
) -> Result<Vec<PathBuf>> {
    if !fs::try_exists(input_dir).await? {
        return Err(RazmetkaError::InputDirMissing {
            path: input_dir.to_path_buf(),
        });
    }
    fs::create_dir_all(output_dir).await?;

    let mut pending = Vec::new();
    let mut total = 0usize;
    let mut entries = fs::read_dir(input_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        // Follows symlinks; a dangling link is not a record.
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => continue,
        }
        let Some(result_path) = naming.result_path(output_dir, &path) else {
            continue;
        };
        total += 1;

        if fs::try_exists(&result_path).await? {
            debug!("{} already annotated", path.display());
            continue;
        }
        pending.push(path);
    }

    pending.sort();
    debug!(
        "{} metadata files in {}, {} pending",
        total,
        input_dir.display(),
        pending.len()
    );

    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_find_pending_skips_annotated_records() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("supplements_videos");
        let output = dir.path().join("supplements_results");
        fs::create_dir_all(&input).await.unwrap();
        fs::create_dir_all(&output).await.unwrap();

        for stem in ["a", "b", "c"] {
            fs::write(input.join(format!("{stem}.info.json")), b"{}")
                .await
                .unwrap();
            fs::write(input.join(format!("{stem}.mp4")), b"")
                .await
                .unwrap();
        }
        fs::write(output.join("b.result.json"), b"{}").await.unwrap();

        let pending = find_pending(&input, &output, &ResultNaming::default())
            .await
            .unwrap();

        assert_eq!(
            pending,
            vec![input.join("a.info.json"), input.join("c.info.json")]
        );
    }

    #[tokio::test]
    async fn test_find_pending_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("nested").join("out");
        fs::create_dir_all(&input).await.unwrap();
        fs::write(input.join("x.info.json"), b"{}").await.unwrap();

        let pending = find_pending(&input, &output, &ResultNaming::default())
            .await
            .unwrap();

        assert!(output.is_dir());
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_find_pending_ignores_other_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(input.join("sub.info.json")).await.unwrap();
        fs::write(input.join("notes.json"), b"{}").await.unwrap();
        fs::write(input.join("clip.webm"), b"").await.unwrap();

        let pending = find_pending(&input, &output, &ResultNaming::default())
            .await
            .unwrap();

        assert!(pending.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_find_pending_follows_symlinks() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        let store = dir.path().join("store");
        fs::create_dir_all(&input).await.unwrap();
        fs::create_dir_all(&store).await.unwrap();
        fs::write(store.join("linked.info.json"), b"{}").await.unwrap();
        fs::symlink(store.join("linked.info.json"), input.join("linked.info.json"))
            .await
            .unwrap();
        fs::symlink(store.join("gone.info.json"), input.join("dangling.info.json"))
            .await
            .unwrap();

        let pending = find_pending(&input, &output, &ResultNaming::default())
            .await
            .unwrap();

        assert_eq!(pending, vec![input.join("linked.info.json")]);
    }

    #[tokio::test]
    async fn test_find_pending_missing_input_dir() {
        let dir = TempDir::new().unwrap();
        let err = find_pending(
            &dir.path().join("nope"),
            &dir.path().join("out"),
            &ResultNaming::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RazmetkaError::InputDirMissing { .. }));
    }
}
