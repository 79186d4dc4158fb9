//! Overlapping fixed-size chunking that prefers line boundaries
//!
//! Sizes and offsets are in bytes, always on UTF-8 char boundaries.

/// A slice of a unit's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    /// Byte offset of `text` within the unit
    pub offset: usize,
    pub text: String,
}

/// Split `text` into chunks of at most `size` bytes, each starting no later
/// than the end of the previous one and overlapping it by up to `overlap`
/// bytes. Chunks end after a newline when one falls inside the window, and
/// later chunks start at a line start inside the overlap region when one
/// exists.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
    let size = size.max(1);
    let len = text.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < len {
        let end = chunk_end(text, start, size);
        chunks.push(Chunk {
            index: chunks.len(),
            offset: start,
            text: text[start..end].to_string(),
        });
        if end == len {
            break;
        }
        start = next_start(text, start, end, overlap);
    }

    chunks
}

/// Inverse of [`chunk_text`]: drop each chunk's overlap with its predecessor
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index);

    let mut out = String::new();
    let mut covered = 0;
    for chunk in ordered {
        let chunk_end = chunk.offset + chunk.text.len();
        if chunk_end <= covered {
            continue;
        }
        let skip = covered.saturating_sub(chunk.offset);
        out.push_str(&chunk.text[skip..]);
        covered = chunk_end;
    }
    out
}

fn chunk_end(text: &str, start: usize, size: usize) -> usize {
    let len = text.len();
    let mut hard_end = floor_boundary(text, (start + size).min(len));
    if hard_end <= start {
        // window smaller than one char
        hard_end = ceil_boundary(text, start + 1);
    }
    if hard_end == len {
        return len;
    }
    match text[start..hard_end].rfind('\n') {
        Some(i) => start + i + 1,
        None => hard_end,
    }
}

fn next_start(text: &str, start: usize, end: usize, overlap: usize) -> usize {
    let target = ceil_boundary(text, end.saturating_sub(overlap).max(start + 1));
    if target >= end {
        return end;
    }
    if text.as_bytes()[target - 1] == b'\n' {
        return target;
    }
    match text[target..end].find('\n') {
        Some(i) => target + i + 1,
        None => target,
    }
}

fn floor_boundary(text: &str, mut i: usize) -> usize {
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i.min(text.len())
}
