//! Filesystem sink for returned map images.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes response bodies under a fixed output directory.
///
/// The sampler core never touches the filesystem itself; successful
/// responses are handed here by the runner.
pub struct ImageSink {
    dir: PathBuf,
}

impl ImageSink {
    /// Create a sink rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Write image bytes to `<dir>/<label>.<ext>`, where the extension is
    /// derived from the image mime type. Returns the written path.
    pub fn save(&self, label: &str, mime: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self
            .dir
            .join(format!("{}.{}", sanitize_label(label), extension_for(mime)));
        let mut file = fs::File::create(&path)?;
        file.write_all(bytes)?;
        Ok(path)
    }
}

/// File extension for an image mime type.
pub fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

// Labels embed layer names like "hel:Karttasarja" which are not valid in
// file names on every platform.
fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_writes_bytes_under_label() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ImageSink::new(dir.path().join("images")).unwrap();

        let path = sink
            .save("WMS-GetMap-hel:Karttasarja-0.40m", "image/jpeg", b"jpegdata")
            .unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "WMS-GetMap-hel_Karttasarja-0.40m.jpg"
        );
        assert_eq!(fs::read(&path).unwrap(), b"jpegdata");
    }

    #[test]
    fn test_extension_for_known_formats() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("application/octet-stream"), "bin");
    }
}
