//! Mime detection helpers

use crate::types::FileRef;

/// Sniff an image mime type from magic bytes, defaulting to PNG
pub fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

const TEXT_MIMES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/yaml",
    "application/x-yaml",
    "application/toml",
    "application/javascript",
    "application/typescript",
    "application/x-sh",
    "application/sql",
];

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "tsv", "json", "jsonl", "xml", "yaml", "yml", "toml", "ini",
    "cfg", "conf", "log", "html", "htm", "css", "scss", "js", "jsx", "ts", "tsx", "mjs", "py",
    "rs", "go", "java", "kt", "c", "h", "cpp", "hpp", "cs", "rb", "php", "swift", "sh", "bash",
    "zsh", "sql", "lua", "r", "scala", "vue", "svelte", "tex",
];

/// Whether a file should be read and sent as text
pub fn is_text_file(file: &FileRef) -> bool {
    let mime = file.mime.to_lowercase();
    if mime.starts_with("text/") || TEXT_MIMES.contains(&mime.as_str()) {
        return true;
    }
    file.extension()
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_image_mime() {
        assert_eq!(sniff_image_mime(&[0x89, b'P', b'N', b'G', 0x0D]), "image/png");
        assert_eq!(sniff_image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_image_mime(b"GIF89a...."), "image/gif");
        assert_eq!(sniff_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_image_mime(b"??"), "image/png");
    }

    #[test]
    fn test_text_file_detection() {
        assert!(is_text_file(&FileRef::new("1", "a.bin", "text/plain", 1)));
        assert!(is_text_file(&FileRef::new("2", "main.rs", "application/octet-stream", 1)));
        assert!(is_text_file(&FileRef::new("3", "data", "application/json", 1)));
        assert!(!is_text_file(&FileRef::new("4", "paper.pdf", "application/pdf", 1)));
    }
}
