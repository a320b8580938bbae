//! Output naming shared by the file-producing handlers.
//!
//! This is helper code, not a handler: it never appears in the registry.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use url::Url;

use crate::cli::Args;

/// Fallback stem when nothing usable survives sanitizing.
const FALLBACK_STEM: &str = "archive";

/// Build the output stem (no extension) for `url`.
///
/// `--filename` wins over the URL-derived name. The name is clipped to
/// `--filename-clip` characters, then `_<hash>` is appended when `--url-hash`
/// is set.
#[must_use]
pub fn output_stem(url: &str, args: &Args, handle: &str) -> String {
    let base = match args.filename.as_deref() {
        Some(template) => expand_template(template, url, handle),
        None => name_from_url(url),
    };

    let mut stem: String = sanitize_stem(&base)
        .chars()
        .take(args.filename_clip)
        .collect();
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }

    if args.url_hash {
        let hash = url_hash(url, args.hash_clip);
        if !hash.is_empty() {
            stem = format!("{stem}_{hash}");
        }
    }

    stem
}

/// Full output path for `url` inside `dir`, with `ext` appended.
#[must_use]
pub fn output_path(dir: &Path, url: &str, args: &Args, handle: &str, ext: &str) -> PathBuf {
    let stem = output_stem(url, args, handle);
    if ext.is_empty() {
        dir.join(stem)
    } else {
        dir.join(format!("{stem}.{ext}"))
    }
}

/// Reason to skip writing `path`, if any.
///
/// Existing files are kept unless `--overwrite` was given.
#[must_use]
pub fn skip_reason(path: &Path, args: &Args) -> Option<String> {
    if !args.overwrite && path.exists() {
        Some(format!(
            "{} already exists (use --overwrite to replace it)",
            path.display()
        ))
    } else {
        None
    }
}

/// In-progress output file, removed on drop unless committed.
///
/// Tools write to `<path>.part`; the final path is only touched by
/// [`PartFile::commit`].
#[derive(Debug)]
pub struct PartFile {
    part: PathBuf,
    committed: bool,
}

impl PartFile {
    /// Reserve `<dest>.part`, clearing any leftover from an earlier run.
    ///
    /// # Errors
    ///
    /// Returns an error if a stale part file exists and cannot be removed.
    pub fn for_output(dest: &Path) -> std::io::Result<Self> {
        let mut name = dest.as_os_str().to_os_string();
        name.push(".part");
        let part = PathBuf::from(name);

        match std::fs::remove_file(&part) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        Ok(Self {
            part,
            committed: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.part
    }

    /// Whether the tool produced the part file.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.part.exists()
    }

    /// Move the part file to `dest`, replacing whatever is there.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails; the part file is then removed.
    pub async fn commit(mut self, dest: &Path) -> std::io::Result<()> {
        tokio::fs::rename(&self.part, dest).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.part);
        }
    }
}

/// First `clip` hex characters of the SHA-256 of `url`.
#[must_use]
pub fn url_hash(url: &str, clip: usize) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    digest.chars().take(clip).collect()
}

fn expand_template(template: &str, url: &str, handle: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(ToString::to_string))
        .unwrap_or_default();
    template
        .replace("{host}", &host)
        .replace("{handle}", handle)
        .replace("{date}", &chrono::Local::now().format("%Y-%m-%d").to_string())
}

/// Host plus path, without the extension of the last path segment.
fn name_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let mut parts: Vec<String> = Vec::new();
    if let Some(host) = parsed.host_str() {
        parts.push(host.to_string());
    }

    let path = parsed.path().trim_matches('/');
    let path = match path.rsplit_once('/') {
        Some((dir, last)) => format!("{dir}/{}", strip_extension(last)),
        None => strip_extension(path).to_string(),
    };
    if !path.is_empty() {
        parts.push(path);
    }
    if let Some(query) = parsed.query() {
        parts.push(query.to_string());
    }

    parts.join("_")
}

fn strip_extension(segment: &str) -> &str {
    match segment.rsplit_once('.') {
        Some((name, ext)) if !name.is_empty() && ext.len() <= 5 => name,
        _ => segment,
    }
}

/// Make a string filesystem-safe.
///
/// Anything that is not alphanumeric or one of `-_.()[]` becomes `_`; runs
/// of underscores collapse and leading/trailing underscores and dots go.
fn sanitize_stem(name: &str) -> String {
    let mapped: String = name
        .chars()
        .map(|c| match c {
            '(' | ')' | '[' | ']' | '-' | '_' | '.' => c,
            c if c.is_alphanumeric() => c,
            _ => '_',
        })
        .collect();

    mapped
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .trim_matches('.')
        .to_string()
}
