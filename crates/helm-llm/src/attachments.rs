//! Attachment encoding and submission assembly.
//!
//! Files whose extension marks them as non-inspectable binaries (archives,
//! compiled libraries) are never embedded inline — only their names appear
//! in the synthesized preamble. Everything else becomes an inline base64
//! part, with the text prompt prefixed by a preamble naming what was
//! attached. Squad mode gets a richer project-context preamble with
//! project-type detection.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use helm_core::personas::Mode;

use crate::gateway::Part;

/// Extensions that are referenced by name only, never embedded inline.
pub const BINARY_EXTENSIONS: [&str; 8] = [
    ".dll", ".zip", ".rar", ".7z", ".tar.gz", ".tgz", ".gz", ".tar",
];

/// A file staged for submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachedFile {
    /// Original filename.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Base64-encoded content.
    pub data: String,
}

impl AttachedFile {
    /// Stage raw bytes, inferring the MIME type from the filename.
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        let name = name.into();
        let mime_type = mime_for_filename(&name).to_owned();
        Self {
            name,
            mime_type,
            data: BASE64.encode(bytes),
        }
    }

    /// Whether this file is treated as a non-inspectable binary.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        let lower = self.name.to_lowercase();
        BINARY_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
    }
}

/// Infer a MIME type from a filename's extension.
#[must_use]
pub fn mime_for_filename(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.ends_with(".tar.gz") {
        return "application/gzip";
    }
    let extension = lower.rsplit('.').next().unwrap_or("");
    match extension {
        // Text & code
        "txt" | "py" | "java" | "c" | "cpp" | "cs" | "go" | "php" | "rb" | "rs" | "swift"
        | "ts" => "text/plain",
        "html" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "md" => "text/markdown",
        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        // Video
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        // Documents
        "pdf" => "application/pdf",
        // Archives
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "rar" => "application/x-rar-compressed",
        "7z" => "application/x-7z-compressed",
        _ => "application/octet-stream",
    }
}

/// Guess the project type from attached filenames.
#[must_use]
pub fn detect_project_type(names: &[String]) -> Option<&'static str> {
    let lower: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
    let has = |name: &str| lower.iter().any(|n| n == name);
    if has("package.json") {
        return Some("Node.js");
    }
    if has("requirements.txt") || has("pyproject.toml") {
        return Some("Python");
    }
    if has("pom.xml") || lower.iter().any(|n| n.ends_with(".gradle")) {
        return Some("Java");
    }
    if has("gemfile") {
        return Some("Ruby");
    }
    if has("go.mod") {
        return Some("Go");
    }
    if has("cargo.toml") {
        return Some("Rust");
    }
    None
}

/// Assemble the parts of a user submission: inline data for readable files
/// first, then the (possibly preamble-prefixed) text prompt.
#[must_use]
pub fn build_submission(message: &str, files: &[AttachedFile], mode: Mode) -> Vec<Part> {
    let mut parts = Vec::with_capacity(files.len() + 1);
    let mut readable = Vec::new();
    let mut binary = Vec::new();

    for file in files {
        if file.is_binary() {
            binary.push(file.name.clone());
        } else {
            readable.push(file.name.clone());
            parts.push(Part::InlineData {
                mime_type: file.mime_type.clone(),
                data: file.data.clone(),
            });
        }
    }

    let text = if files.is_empty() {
        message.to_owned()
    } else if mode == Mode::Squad {
        squad_prompt(message, files, &readable, &binary)
    } else {
        plain_prompt(message, &readable, &binary)
    };

    if !text.is_empty() {
        parts.push(Part::text(text));
    }
    parts
}

fn squad_prompt(
    message: &str,
    files: &[AttachedFile],
    readable: &[String],
    binary: &[String],
) -> String {
    let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
    let mut context = detect_project_type(&names).map_or_else(
        || "You have been provided with a set of files.".to_owned(),
        |kind| format!("You have been provided with what appears to be a {kind} project."),
    );
    if !readable.is_empty() {
        context.push_str(&format!("\nReadable files: [{}].", readable.join(", ")));
    }
    if !binary.is_empty() {
        context.push_str(&format!(
            "\nUnreadable archives/binaries: [{}]. You must infer their contents from the filenames.",
            binary.join(", ")
        ));
    }
    format!(
        "**Project Context:**\n{context}\n\nYour primary task is to analyze this context and \
         the user's request, then formulate a comprehensive plan. Delegate specific analysis, \
         coding, and documentation tasks to your specialists based on the file contents and \
         project type.\n\n---\n\n**User's Request:** {message}"
    )
}

fn plain_prompt(message: &str, readable: &[String], binary: &[String]) -> String {
    let mut lines = Vec::new();
    if !readable.is_empty() {
        lines.push(format!(
            "The user has attached the following files which you can read: [{}]. Use their \
             content as primary context.",
            readable.join(", ")
        ));
    }
    if !binary.is_empty() {
        lines.push(format!(
            "The user has also attached these binary files which you CANNOT read: [{}]. \
             Acknowledge their presence and use their filenames for context.",
            binary.join(", ")
        ));
    }
    format!(
        "**Attached Files Context:**\n{}\n\n---\n\n**User's Prompt:** {message}",
        lines.join("\n")
    )
}
