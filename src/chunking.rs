//! Troceado determinista de documentos en ventanas solapadas.
//!
//! Las longitudes se miden en caracteres. Cada ventana empieza
//! `chunk_overlap` caracteres antes del final de la anterior, de modo que
//! quitando ese solape se reconstruye el documento sin pérdidas.

use tracing::info;

use crate::models::{Chunk, Document};

/// Separadores preferidos, de más a menos fuerte. Los del mismo grupo
/// tienen la misma prioridad.
const BREAKPOINTS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

/// Trocea todos los documentos conservando su orden y el de sus chunks.
pub fn split_documents(
    documents: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    let chunks: Vec<Chunk> = documents
        .iter()
        .flat_map(|doc| {
            split_text(&doc.content, chunk_size, chunk_overlap)
                .into_iter()
                .enumerate()
                .map(|(sequence_index, (start, content))| Chunk {
                    content,
                    source: doc.source.clone(),
                    sequence_index,
                    start,
                })
        })
        .collect();

    info!("Split documents into {} chunks", chunks.len());
    chunks
}

/// Devuelve pares `(inicio, texto)` para un único documento.
fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut windows = Vec::new();

    // `AppConfig::validate` ya lo impide; sin esto el bucle no avanzaría.
    if len == 0 || chunk_size <= chunk_overlap {
        return windows;
    }

    let mut start = 0;
    loop {
        let hard_end = (start + chunk_size).min(len);
        let end = if hard_end == len {
            len
        } else {
            find_breakpoint(&chars, start, hard_end, chunk_size, chunk_overlap).unwrap_or(hard_end)
        };

        windows.push((start, chars[start..end].iter().collect()));
        if end == len {
            break;
        }
        start = end - chunk_overlap;
    }

    windows
}

/// Busca el corte natural más tardío dentro de la mitad final de la ventana.
/// El corte queda siempre por detrás de `start + chunk_overlap` para que la
/// siguiente ventana avance.
fn find_breakpoint(
    chars: &[char],
    start: usize,
    hard_end: usize,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Option<usize> {
    let lower = (start + chunk_size / 2).max(start + chunk_overlap + 1);
    if lower > hard_end {
        return None;
    }

    BREAKPOINTS.iter().find_map(|group| {
        (lower..=hard_end)
            .rev()
            .find(|&end| group.iter().any(|sep| ends_with_at(chars, end, sep)))
    })
}

fn ends_with_at(chars: &[char], end: usize, sep: &str) -> bool {
    let sep_len = sep.chars().count();
    end >= sep_len && chars[end - sep_len..end].iter().copied().eq(sep.chars())
}
