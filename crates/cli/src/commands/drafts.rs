//! Catalog, draft and asset commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use podforge_client::{AssetUpload, Gateway, PodClient};
use podforge_core::{DraftId, DraftSpec, DraftStatus, ProductDraft};
use tracing::info;

use super::CommandError;

/// Print the API liveness status.
pub async fn health<G: Gateway>(client: &PodClient<G>) -> Result<(), CommandError> {
    let health = client.load_health().await?;
    println!("API status: {}", health.status);
    Ok(())
}

/// Print the template catalog.
pub async fn templates<G: Gateway>(client: &PodClient<G>) -> Result<(), CommandError> {
    let templates = client.load_templates().await?;
    if templates.is_empty() {
        println!("No templates.");
        return Ok(());
    }

    println!("{:>6}  {:<32}  {:<24}  ACTIVE", "ID", "NAME", "GELATO TEMPLATE");
    for template in templates {
        println!(
            "{:>6}  {:<32}  {:<24}  {}",
            template.id,
            template.name,
            template.gelato_template_id,
            if template.is_active { "yes" } else { "no" }
        );
    }
    Ok(())
}

/// Print every draft.
pub async fn list<G: Gateway>(client: &PodClient<G>) -> Result<(), CommandError> {
    let drafts = client.load_drafts().await?;
    if drafts.is_empty() {
        println!("No drafts.");
        return Ok(());
    }

    println!("{:>6}  {:<8}  {:>10}  TITLE", "ID", "STATUS", "PRICE");
    for draft in &drafts {
        print_row(draft);
    }
    Ok(())
}

/// Print one draft in full.
pub async fn show<G: Gateway>(client: &PodClient<G>, id: DraftId) -> Result<(), CommandError> {
    let draft = client.load_draft(id).await?;

    println!("Draft {}", draft.id);
    println!("  Title:       {}", draft.title);
    println!("  Status:      {}", draft.status);
    println!("  Price:       {}", draft.price);
    println!("  Template:    {} ({})", draft.template.name, draft.template.id);
    if !draft.description.is_empty() {
        println!("  Description: {}", draft.description);
    }
    if !draft.tags.is_empty() {
        println!("  Tags:        {}", draft.tags.join(", "));
    }
    for asset in &draft.assets {
        println!("  Asset:       {} {} ({})", asset.id, asset.original_filename, asset.mime_type);
    }
    println!("  Updated:     {}", draft.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

/// Upload design files and print the created assets.
pub async fn upload<G: Gateway>(client: &PodClient<G>, files: &[PathBuf]) -> Result<(), CommandError> {
    let mut uploads = Vec::with_capacity(files.len());
    for path in files {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| CommandError::ReadFile {
                path: path.clone(),
                source,
            })?;
        uploads.push(AssetUpload {
            file_name: path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
            mime_type: mime_type(path).map(str::to_owned),
            bytes,
        });
    }

    let assets = client.upload_assets(uploads).await?;
    info!(count = assets.len(), "Assets uploaded");
    for asset in assets {
        println!(
            "{:>6}  {}  {} bytes  {}",
            asset.id, asset.original_filename, asset.size_bytes, asset.mime_type
        );
    }
    Ok(())
}

/// Create one draft and print it.
pub async fn create<G: Gateway>(client: &PodClient<G>, spec: DraftSpec) -> Result<(), CommandError> {
    let created = client.create_drafts(vec![spec]).await?;
    for draft in &created {
        print_row(draft);
    }
    Ok(())
}

/// Queue a push; with `watch`, poll until the draft settles.
pub async fn push<G: Gateway>(client: &PodClient<G>, id: DraftId, watch: bool) -> Result<(), CommandError> {
    let receipt = client.push_draft(id).await?;
    println!("Push queued for draft {} (task {})", receipt.draft_id, receipt.task_id);
    if !watch {
        return Ok(());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Waiting for draft {id} to settle"));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = client.wait_for_draft(id).await;
    spinner.finish_and_clear();
    let draft = result?;

    println!("Draft {} is {}", draft.id, draft.status);
    match draft.status {
        DraftStatus::Failed => Err(CommandError::PushFailed(id)),
        DraftStatus::Queued => {
            println!("Stopped polling; the push is still queued.");
            Ok(())
        }
        DraftStatus::Draft | DraftStatus::Pushed => Ok(()),
    }
}

fn print_row(draft: &ProductDraft) {
    println!(
        "{:>6}  {:<8}  {:>10}  {}",
        draft.id,
        draft.status.to_string(),
        draft.price.to_string(),
        draft.title
    );
}

/// MIME type for common design file extensions.
fn mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}
