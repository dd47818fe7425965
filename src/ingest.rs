//! Carga de los documentos `.txt` y `.md` del primer nivel de un directorio.
//!
//! Un fichero que falla al leerse o parsearse se registra y se omite; la
//! carga nunca falla entera por culpa de un único fichero.

use std::{fs, path::Path};

use mime_guess::MimeGuess;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    error::{AssistantError, Result},
    models::{Document, LoadReport, SkippedFile},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocKind {
    Text,
    Markdown,
}

impl DocKind {
    fn from_path(path: &Path) -> Option<Self> {
        let extension = path
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "txt" => Some(Self::Text),
            "md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// Recorre las entradas directas de `dir` (sin recursión), en orden de nombre.
/// Devuelve los documentos cargados y los ficheros omitidos con su motivo.
pub fn load_documents(dir: &Path) -> Result<LoadReport> {
    if !dir.is_dir() {
        return Err(AssistantError::config(format!(
            "doc dir {} does not exist",
            dir.display()
        )));
    }

    let mut report = LoadReport::default();
    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(dir).to_path_buf();
                warn!("failed to load {}: {err}", path.display());
                report.skipped.push(SkippedFile {
                    path,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(kind) = DocKind::from_path(path) else {
            debug!("Saltando fichero con extensión no soportada: {}", path.display());
            continue;
        };

        match load_file(path, kind) {
            Ok(document) => {
                info!("loaded doc: {}", entry.file_name().to_string_lossy());
                report.documents.push(document);
            }
            Err(reason) => {
                warn!("failed to load {}: {reason}", path.display());
                report.skipped.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason,
                });
            }
        }
    }

    info!("tot docs loaded: {} ({})", report.documents.len(), report);
    Ok(report)
}

fn load_file(path: &Path, kind: DocKind) -> std::result::Result<Document, String> {
    let mime = MimeGuess::from_path(path).first_raw().unwrap_or("text/plain");
    debug!("Leyendo {} como {mime}", path.display());

    let raw = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let content = match kind {
        DocKind::Text => raw,
        DocKind::Markdown => markdown_to_text(&raw),
    };

    Ok(Document {
        content,
        source: path.to_string_lossy().to_string(),
    })
}

/// Convierte markdown en texto plano conservando el texto de títulos,
/// párrafos, elementos de lista y bloques de código.
fn markdown_to_text(source: &str) -> String {
    let mut out = String::with_capacity(source.len());

    for event in Parser::new(source) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Start(Tag::CodeBlock(_) | Tag::List(_)) => end_block(&mut out, 2),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock) => {
                end_block(&mut out, 2)
            }
            Event::End(TagEnd::Item | TagEnd::TableRow | TagEnd::TableHead) => {
                end_block(&mut out, 1)
            }
            Event::End(TagEnd::TableCell) => out.push(' '),
            _ => {}
        }
    }

    out.trim().to_string()
}

/// Cierra un bloque con al menos `newlines` saltos de línea.
fn end_block(out: &mut String, newlines: usize) {
    let kept = out.trim_end_matches('\n').len();
    let existing = out.len() - kept;
    if kept == 0 {
        out.clear();
        return;
    }
    out.truncate(kept);
    out.push_str(&"\n".repeat(existing.max(newlines)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_txt_and_md_and_skips_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "Plain text file.").unwrap();
        fs::write(dir.path().join("b.md"), "# Title\n\nSome *markdown* body.").unwrap();
        fs::write(dir.path().join("c.txt"), [0xff, 0xfe, 0xfd, 0x00, 0xc3]).unwrap();
        fs::write(dir.path().join("d.csv"), "ignored,file").unwrap();

        let report = load_documents(dir.path()).unwrap();

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("c.txt"));
        assert_eq!(report.documents[0].content, "Plain text file.");
        assert_eq!(report.documents[1].content, "Title\n\nSome markdown body.");
    }

    #[test]
    fn does_not_recurse_into_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("inner.txt"), "hidden").unwrap();
        fs::write(dir.path().join("top.txt"), "visible").unwrap();

        let docs = load_documents(dir.path()).unwrap().documents;
        assert_eq!(docs.len(), 1);
        assert!(docs[0].source.ends_with("top.txt"));
    }

    #[test]
    fn empty_directory_yields_no_documents() {
        let dir = tempfile::tempdir().unwrap();
        let report = load_documents(dir.path()).unwrap();
        assert!(report.documents.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn missing_directory_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_documents(&dir.path().join("missing")).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn markdown_lists_and_code_keep_their_text() {
        let md = "## Steps\n\n- first\n- second\n\n```\nlet x = 1;\n```\n\nUse `cargo` here.";
        assert_eq!(
            markdown_to_text(md),
            "Steps\n\nfirst\nsecond\n\nlet x = 1;\n\nUse cargo here."
        );
    }
}
