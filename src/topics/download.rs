// Model download helper for the sentence embedding model.
//
// Fetches all-MiniLM-L6-v2 (ONNX export + tokenizer, ~90MB) from
// HuggingFace into a platform-appropriate directory
// (~/.local/share/keystone/models/ on Linux) so it persists across runs.
// Bodies are streamed to a `.part` file and renamed into place once
// complete, so a half-written model is never picked up by the embedder.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// HuggingFace repo for the sentence embedding model.
const EMBEDDING_HF_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main";

/// One file of the model bundle.
struct ModelFile {
    /// Path within the HuggingFace repo
    remote: &'static str,
    /// File name on disk, as `OnnxEmbedder::load` expects it
    local: &'static str,
    /// Large enough to deserve a progress bar
    show_progress: bool,
}

const EMBEDDING_FILES: [ModelFile; 2] = [
    ModelFile {
        remote: "tokenizer.json",
        local: "tokenizer.json",
        show_progress: false,
    },
    ModelFile {
        remote: "onnx/model.onnx",
        local: "model.onnx",
        show_progress: true,
    },
];

/// Returns the default directory for storing model files.
/// Uses the platform data directory: ~/.local/share/keystone/models/ on Linux.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("keystone")
        .join("models")
}

/// Subdirectory within model_dir for the sentence embedding model.
pub fn embedding_model_dir(base: &Path) -> PathBuf {
    base.join("all-MiniLM-L6-v2")
}

/// Check whether every embedding model file exists.
pub fn embedding_files_present(dir: &Path) -> bool {
    let embed_dir = embedding_model_dir(dir);
    EMBEDDING_FILES.iter().all(|f| embed_dir.join(f.local).exists())
}

/// Download the embedding model bundle, skipping files already on disk.
pub async fn download_model(dir: &Path) -> Result<()> {
    println!("\nSentence embedding model (all-MiniLM-L6-v2):");

    let embed_dir = embedding_model_dir(dir);
    tokio::fs::create_dir_all(&embed_dir)
        .await
        .with_context(|| format!("Failed to create model directory: {}", embed_dir.display()))?;

    let client = reqwest::Client::builder()
        .user_agent("keystone/0.1 (model-download)")
        .build()
        .context("Failed to build HTTP client")?;

    for file in &EMBEDDING_FILES {
        let dest = embed_dir.join(file.local);
        if dest.exists() {
            info!(file = file.local, "Model file already exists, skipping");
            println!("  {} (already exists)", file.local);
            continue;
        }
        println!("  Downloading {}...", file.local);
        let url = format!("{EMBEDDING_HF_URL}/{}", file.remote);
        download_to(&client, &url, &dest, file.show_progress).await?;
    }

    Ok(())
}

/// Stream `url` into `dest` and return the number of bytes written.
///
/// A non-success status fails before anything touches the disk. A body that
/// breaks off mid-stream removes its `.part` file.
pub async fn download_to(client: &reqwest::Client, url: &str, dest: &Path, show_progress: bool) -> Result<u64> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {url}", response.status());
    }

    let pb = show_progress.then(|| progress_bar(response.content_length()));
    let partial = dest.with_extension("part");

    let written = match stream_body(response, &partial, pb.as_ref()).await {
        Ok(written) => written,
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial download");
            }
            return Err(e);
        }
    };

    tokio::fs::rename(&partial, dest)
        .await
        .with_context(|| format!("Failed to move download into {}", dest.display()))?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!(url, dest = %dest.display(), bytes = written, "Downloaded model file");
    Ok(written)
}

async fn stream_body(mut response: reqwest::Response, partial: &Path, pb: Option<&ProgressBar>) -> Result<u64> {
    let mut file = tokio::fs::File::create(partial)
        .await
        .with_context(|| format!("Failed to create {}", partial.display()))?;

    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.context("Failed to read response body")? {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        written += chunk.len() as u64;
        if let Some(pb) = pb {
            pb.inc(chunk.len() as u64);
        }
    }
    file.flush()
        .await
        .with_context(|| format!("Failed to flush {}", partial.display()))?;

    Ok(written)
}

/// A byte bar when the size is known, a spinner otherwise.
fn progress_bar(content_length: Option<u64>) -> ProgressBar {
    match content_length {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .expect("valid template")
                    .progress_chars("=> "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("    {spinner} {bytes}")
                    .expect("valid template"),
            );
            pb
        }
    }
}
