//! Avatar blob storage on the local filesystem.
//!
//! Uploaded images land in data_dir/uploads under a collision-free name and
//! are served back by the static /uploads route.

use std::path::Path;

use uuid::Uuid;

/// Store an uploaded avatar and return its public URL path.
/// The extension is carried over from the client file name; anything
/// without one is stored extension-less.
pub fn store_avatar(
    data_dir: &str,
    original_name: &str,
    bytes: &[u8],
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let uploads_dir = Path::new(data_dir).join("uploads");
    std::fs::create_dir_all(&uploads_dir)?;

    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let file_name = format!("{}{}", Uuid::now_v7(), ext);

    std::fs::write(uploads_dir.join(&file_name), bytes)?;

    Ok(format!("/uploads/{}", file_name))
}
