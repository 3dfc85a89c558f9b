//! Text splitters.
//!
//! Two strategy families are available, selected through the closed
//! [`SplitterKind`] tag:
//!
//! - **Character window** ([`CharacterSplitter`]): recursively splits on
//!   `"\n\n"`, `"\n"`, `" "` and finally single characters, then greedily
//!   merges pieces into windows of at most `chunk_size` characters, carrying
//!   up to `chunk_overlap` characters of trailing context into the next
//!   window.
//! - **Sentence** ([`SentenceSplitter`]): packs whole sentences into windows
//!   of at most `chunk_size` whitespace tokens with `chunk_overlap` tokens of
//!   trailing sentences carried forward.
//!
//! Lengths are measured in Unicode scalar values (or tokens), so a window
//! boundary never falls inside a UTF-8 sequence.
//!
//! # Example
//!
//! ```rust
//! use ragchat::chunk::CharacterSplitter;
//!
//! let splitter = CharacterSplitter::new(500, 200).unwrap();
//! let pieces = splitter.split_text("Hello world.\n\nSecond paragraph.");
//! assert_eq!(pieces, vec!["Hello world.\n\nSecond paragraph."]);
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Separator ladder for the character-window strategy, coarsest first.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Strategy family tag. Each tag maps to exactly one splitter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitterKind {
    Characters,
    Sentence,
}

impl SplitterKind {
    /// Instantiate the splitter for this tag with the given window.
    pub fn build(self, chunk_size: usize, chunk_overlap: usize) -> Result<TextSplitter> {
        Ok(match self {
            SplitterKind::Characters => {
                TextSplitter::Characters(CharacterSplitter::new(chunk_size, chunk_overlap)?)
            }
            SplitterKind::Sentence => {
                TextSplitter::Sentence(SentenceSplitter::new(chunk_size, chunk_overlap)?)
            }
        })
    }
}

/// A configured splitter of either family.
#[derive(Debug, Clone)]
pub enum TextSplitter {
    Characters(CharacterSplitter),
    Sentence(SentenceSplitter),
}

impl TextSplitter {
    pub fn kind(&self) -> SplitterKind {
        match self {
            TextSplitter::Characters(_) => SplitterKind::Characters,
            TextSplitter::Sentence(_) => SplitterKind::Sentence,
        }
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        match self {
            TextSplitter::Characters(s) => s.split_text(text),
            TextSplitter::Sentence(s) => s.split_text(text),
        }
    }

    /// Split every chunk, keeping source order. Each piece inherits the
    /// metadata of the chunk it came from.
    pub fn split_chunks(&self, chunks: Vec<Chunk>) -> Vec<Chunk> {
        chunks
            .iter()
            .flat_map(|chunk| {
                self.split_text(&chunk.content)
                    .into_iter()
                    .map(move |piece| chunk.with_content(piece))
            })
            .collect()
    }
}

fn check_window(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::invalid_argument("chunk_size must be > 0"));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::invalid_argument(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            chunk_overlap, chunk_size
        )));
    }
    Ok(())
}

/// Character-window splitter.
#[derive(Debug, Clone)]
pub struct CharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl CharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_window(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<(&str, usize)> = Vec::new();
        for split in splits {
            let len = char_len(split);
            if len < self.chunk_size {
                fitting.push((split, len));
                continue;
            }
            if !fitting.is_empty() {
                out.extend(merge_windows(
                    &fitting,
                    separator,
                    char_len(separator),
                    self.chunk_size,
                    self.chunk_overlap,
                ));
                fitting.clear();
            }
            if finer.is_empty() {
                let trimmed = split.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            } else {
                out.extend(self.split_recursive(split, finer));
            }
        }
        if !fitting.is_empty() {
            out.extend(merge_windows(
                &fitting,
                separator,
                char_len(separator),
                self.chunk_size,
                self.chunk_overlap,
            ));
        }
        out
    }
}

/// Sentence splitter measured in whitespace tokens.
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    tokens_per_chunk: usize,
    overlap_tokens: usize,
}

impl SentenceSplitter {
    pub fn new(tokens_per_chunk: usize, overlap_tokens: usize) -> Result<Self> {
        check_window(tokens_per_chunk, overlap_tokens)?;
        Ok(Self {
            tokens_per_chunk,
            overlap_tokens,
        })
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut units: Vec<String> = Vec::new();
        for sentence in split_sentences(text) {
            let words: Vec<&str> = sentence.split_whitespace().collect();
            if words.len() <= self.tokens_per_chunk {
                units.push(words.join(" "));
            } else {
                units.extend(words.chunks(self.tokens_per_chunk).map(|w| w.join(" ")));
            }
        }

        let pieces: Vec<(&str, usize)> = units
            .iter()
            .map(|u| (u.as_str(), u.split_whitespace().count()))
            .collect();
        merge_windows(&pieces, " ", 0, self.tokens_per_chunk, self.overlap_tokens)
    }
}

/// Split text into trimmed sentences. A sentence ends at `.`, `!` or `?`
/// followed by whitespace, or at a blank line.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '.' | '!' | '?' => chars.peek().map_or(true, |(_, next)| next.is_whitespace()),
            '\n' => chars.peek().map_or(false, |(_, next)| *next == '\n'),
            _ => false,
        };
        if boundary {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Greedily merge `(piece, length)` pairs into windows no longer than
/// `size`, re-using trailing pieces worth at most `overlap` as the head of
/// the next window. Windows are trimmed; empty windows are dropped.
fn merge_windows(
    pieces: &[(&str, usize)],
    separator: &str,
    separator_len: usize,
    size: usize,
    overlap: usize,
) -> Vec<String> {
    let mut windows = Vec::new();
    let mut current: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    let joiner = |current: &VecDeque<(&str, usize)>| if current.is_empty() { 0 } else { separator_len };

    for &(piece, len) in pieces {
        if total + len + joiner(&current) > size && !current.is_empty() {
            push_window(&mut windows, &current, separator);
            while total > overlap || (total > 0 && total + len + joiner(&current) > size) {
                match current.pop_front() {
                    Some((_, first_len)) => {
                        total -= first_len + joiner(&current);
                    }
                    None => {
                        total = 0;
                        break;
                    }
                }
            }
        }
        total += len + joiner(&current);
        current.push_back((piece, len));
    }
    push_window(&mut windows, &current, separator);
    windows
}

fn push_window(windows: &mut Vec<String>, current: &VecDeque<(&str, usize)>, separator: &str) {
    let joined = current
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        windows.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// SHA-256 of a chunk's text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let s = CharacterSplitter::new(500, 200).unwrap();
        assert_eq!(s.split_text("Hello, world!"), vec!["Hello, world!"]);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let s = CharacterSplitter::new(500, 200).unwrap();
        assert!(s.split_text("").is_empty());
        assert!(s.split_text("   \n\n  ").is_empty());
    }

    #[test]
    fn test_windows_respect_size_and_overlap() {
        let s = CharacterSplitter::new(500, 200).unwrap();
        let text = "a".repeat(1000);
        let pieces = s.split_text(&text);
        let lens: Vec<usize> = pieces.iter().map(|p| p.chars().count()).collect();
        assert_eq!(lens, vec![500, 500, 400]);
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let s = CharacterSplitter::new(30, 5).unwrap();
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let pieces = s.split_text(text);
        assert_eq!(
            pieces,
            vec!["First paragraph here.", "Second paragraph here."]
        );
    }

    #[test]
    fn test_word_windows_carry_overlap() {
        let s = CharacterSplitter::new(12, 6).unwrap();
        let pieces = s.split_text("one two three four five");
        assert!(pieces.len() > 1);
        for p in &pieces {
            assert!(p.chars().count() <= 12, "window too long: {:?}", p);
        }
        // Every window after the first starts with a word that ended the previous one.
        for pair in pieces.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(pair[1].starts_with(last_word), "{:?}", pair);
        }
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let s = CharacterSplitter::new(5, 1).unwrap();
        let text = "┌──────────────────┐";
        let pieces = s.split_text(text);
        assert!(!pieces.is_empty());
        for p in &pieces {
            assert!(p.chars().count() <= 5);
        }
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        assert!(matches!(
            CharacterSplitter::new(10, 10),
            Err(RagError::InvalidArgument(_))
        ));
        assert!(matches!(
            SentenceSplitter::new(0, 0),
            Err(RagError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sentence_splitter_keeps_sentences_whole() {
        let s = SentenceSplitter::new(6, 0).unwrap();
        let pieces = s.split_text("The cat sat. The dog ran away! Where did it go?");
        assert_eq!(
            pieces,
            vec!["The cat sat.", "The dog ran away!", "Where did it go?"]
        );
    }

    #[test]
    fn test_sentence_splitter_hard_splits_long_sentences() {
        let s = SentenceSplitter::new(3, 1).unwrap();
        let pieces = s.split_text("a b c d e f g");
        for p in &pieces {
            assert!(p.split_whitespace().count() <= 3);
        }
        assert_eq!(pieces.first().map(String::as_str), Some("a b c"));
    }

    #[test]
    fn test_split_chunks_preserves_order_and_metadata() {
        let splitter = SplitterKind::Characters.build(10, 2).unwrap();
        let mut meta = crate::models::Metadata::new();
        meta.insert("source".into(), "a.txt".into());
        let chunks = vec![
            Chunk::new("alpha beta gamma", meta.clone()),
            Chunk::new("delta", crate::models::Metadata::new()),
        ];
        let out = splitter.split_chunks(chunks);
        assert!(out.len() >= 3);
        assert_eq!(out.last().unwrap().content, "delta");
        assert!(out.last().unwrap().metadata.is_empty());
        assert_eq!(out[0].metadata, meta);
        assert_eq!(splitter.kind(), SplitterKind::Characters);
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }
}
