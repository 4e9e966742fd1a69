use std::collections::VecDeque;

/// Boundaries tried in order when a span is too long.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
}

/// Splits text into overlapping chunks of at most `chunk_size` characters,
/// preferring paragraph, then line, then sentence, then word boundaries.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// `overlap` is capped below `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        self.atomize(text, 0, &mut pieces);

        let mut chunks: Vec<String> = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut window_len = 0;

        for piece in pieces {
            let len = char_len(piece);
            if window_len + len > self.chunk_size && !window.is_empty() {
                emit(&mut chunks, &window);
                // Keep a tail of at most `overlap` chars that still leaves room for `piece`.
                while let Some(front) = window.front() {
                    if window_len <= self.overlap && window_len + len <= self.chunk_size {
                        break;
                    }
                    window_len -= char_len(front);
                    window.pop_front();
                }
            }
            window.push_back(piece);
            window_len += len;
        }
        emit(&mut chunks, &window);

        chunks
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| TextChunk { text, chunk_index })
            .collect()
    }

    /// Break `text` into pieces no longer than `chunk_size`.
    fn atomize<'a>(&self, text: &'a str, level: usize, out: &mut Vec<&'a str>) {
        if char_len(text) <= self.chunk_size {
            out.push(text);
            return;
        }

        match SEPARATORS.get(level) {
            Some(separator) => {
                for part in text.split_inclusive(separator) {
                    self.atomize(part, level + 1, out);
                }
            }
            None => {
                let mut start = 0;
                for (count, (offset, _)) in text.char_indices().enumerate() {
                    if count > 0 && count % self.chunk_size == 0 {
                        out.push(&text[start..offset]);
                        start = offset;
                    }
                }
                out.push(&text[start..]);
            }
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn emit(chunks: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() && chunks.last().map(String::as_str) != Some(trimmed) {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<TextChunk> {
        TextSplitter::new(chunk_size, overlap).split(text)
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 100, 10).is_empty());
        assert!(chunk_text(" \n\n ", 100, 10).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("  short  ", 100, 10);
        assert_eq!(chunks, vec![TextChunk { text: "short".to_string(), chunk_index: 0 }]);
    }

    #[test]
    fn test_chunks_respect_size_and_are_numbered() {
        let text = "Lorem ipsum dolor sit amet. ".repeat(200);
        let chunks = chunk_text(&text, 1000, 200);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert!(chunk.text.chars().count() <= 1000);
            assert!(!chunk.text.is_empty());
        }
    }

    #[test]
    fn test_paragraph_boundaries_preferred() {
        let first = "a".repeat(60);
        let second = "b".repeat(60);
        let text = format!("{}\n\n{}", first, second);

        let chunks = chunk_text(&text, 100, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, first);
        assert_eq!(chunks[1].text, second);
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text: String = (0..20).map(|i| format!("Sentence number {:02} is here. ", i)).collect();
        let chunks = chunk_text(&text, 100, 30);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let lead = pair[1].text.split(". ").next().unwrap();
            assert!(pair[0].text.contains(lead), "{:?} should overlap {:?}", pair[0].text, pair[1].text);
        }
    }

    #[test]
    fn test_unbroken_text_hard_split() {
        let text = "x".repeat(250);
        let chunks = chunk_text(&text, 100, 0);
        let lengths: Vec<usize> = chunks.iter().map(|c| c.text.len()).collect();
        assert_eq!(lengths, vec![100, 100, 50]);
    }

    #[test]
    fn test_multibyte_text_is_safe() {
        let text = "これはテスト文章です。日本語のマルチバイト文字を含むテキストを正しく分割できるか確かめます。".repeat(10);
        let chunks = chunk_text(&text, 60, 10);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 60);
        }
    }

    #[test]
    fn test_overlap_capped_below_size() {
        let text: String = (0..100).map(|i| format!("w{:03} ", i)).collect();
        let chunks = chunk_text(&text, 20, 50);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 20));
    }
}
