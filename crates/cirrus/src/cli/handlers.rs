//! Command handlers.

use super::commands::OutputFormat;
use chrono::{DateTime, Utc};
use cirrus::{CirrusSettings, CloudAttachments, KeyCodec, StoredObject};
use std::path::Path;
use std::time::Duration;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Upload `file` and print the stored fields.
pub async fn put(
    settings: &CirrusSettings,
    file: &Path,
    name: Option<String>,
    created_at: Option<DateTime<Utc>>,
    content_type: Option<String>,
    format: OutputFormat,
) -> CliResult {
    let attachments = CloudAttachments::from_settings(settings);

    let filename = name
        .or_else(|| {
            file.file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .ok_or_else(|| format!("{} has no file name", file.display()))?;

    let mut record = StoredObject::new(0, filename, created_at.unwrap_or_else(Utc::now));
    if let Some(content_type) = content_type {
        record = record.with_content_type(content_type);
    }

    let content = tokio::fs::File::open(file)
        .await
        .map_err(|e| format!("Failed to open {}: {}", file.display(), e))?;
    let outcome = attachments.finalize(&mut record, content).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        OutputFormat::Human => {
            println!("Stored on {}", outcome.kind());
            println!("{:-<60}", "");
            println!("encoded key:    {}", outcome.encoded_key());
            println!("physical key:   {}", outcome.physical_key());
            println!("directory:      {}", outcome.disk_directory());
            println!("sha256:         {}", outcome.content_hash());
            println!("size:           {}", outcome.size());
            println!("content type:   {}", outcome.content_type());
        }
    }

    Ok(())
}

/// Resolve a stored object and print its local path.
pub async fn fetch(
    settings: &CirrusSettings,
    id: u64,
    key: &str,
    created_at: DateTime<Utc>,
    dir: Option<String>,
) -> CliResult {
    let attachments = CloudAttachments::from_settings(settings);
    let record = StoredObject::new(id, KeyCodec::decode(key).basename().as_str(), created_at)
        .with_encoded_key(key)
        .with_disk_directory(dir.unwrap_or_else(|| KeyCodec::date_partition(created_at)));

    let resolution = attachments.resolve_entry(&record).await;
    if resolution.is_degraded() || !resolution.path().exists() {
        return Err(format!("{} is unavailable", key).into());
    }

    println!("{}", resolution.path().display());
    Ok(())
}

/// Print a presigned URL for a cloud object.
pub async fn url(
    settings: &CirrusSettings,
    key: &str,
    created_at: DateTime<Utc>,
    ttl: Option<u64>,
) -> CliResult {
    let attachments = CloudAttachments::from_settings(settings);
    let record = StoredObject::new(0, key, created_at).with_encoded_key(key);

    match attachments
        .direct_download_url(&record, ttl.map(Duration::from_secs))
        .await
    {
        Some(url) => {
            println!("{}", url);
            Ok(())
        }
        None => Err(format!("No direct URL available for {}", key).into()),
    }
}

/// Delete a cloud object. Local keys are left alone.
pub async fn remove(settings: &CirrusSettings, key: &str, created_at: DateTime<Utc>) {
    if !KeyCodec::is_cloud(key) {
        println!("{} is a local object; nothing to delete", key);
        return;
    }

    let attachments = CloudAttachments::from_settings(settings);
    attachments.delete_object(key, created_at).await;
    println!("Requested deletion of {}", key);
}

/// Print the effective settings.
pub fn print_config(settings: &CirrusSettings) {
    println!("storage:        {}", settings.storage());
    println!("local root:     {}", settings.local().root().display());
    println!("cache root:     {}", settings.cache().root().display());
    println!("thumbnails:     {}", settings.thumbnails().root().display());
    println!(
        "timeouts:       request {}s, connect {}s",
        settings.timeouts().request_secs(),
        settings.timeouts().connect_secs()
    );

    for config in settings.backend_configs() {
        println!();
        println!("[{}]", config.kind());
        for (key, value) in config.redacted() {
            println!("{} = {}", key, value);
        }
    }
}
