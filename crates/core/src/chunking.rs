use crate::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap_chars ({}) must be smaller than max_chars ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Boundary kinds, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

/// Splits `text` into chunks of at most `max_chars` characters where each
/// chunk shares at least `overlap_chars` characters with the next one.
///
/// Cuts prefer paragraph, line, sentence and word boundaries, in that order,
/// and fall back to a hard character cut. Empty input yields no chunks.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    let chars: Vec<char> = text.chars().collect();
    let spans = chunk_spans(&chars, config)?;
    Ok(spans
        .into_iter()
        .map(|(start, end)| chars[start..end].iter().collect())
        .collect())
}

/// Character offsets `[start, end)` of every chunk [`split_text`] produces.
pub fn chunk_spans(chars: &[char], config: ChunkingConfig) -> Result<Vec<(usize, usize)>, IngestError> {
    config.validate()?;

    let total = chars.len();
    let mut spans = Vec::new();
    if total == 0 {
        return Ok(spans);
    }

    let mut start = 0usize;
    loop {
        if total - start <= config.max_chars {
            spans.push((start, total));
            break;
        }

        let hard_end = start + config.max_chars;
        // The end must leave room for the overlap and still move forward.
        let min_end = start + (config.overlap_chars + 1).max(config.max_chars / 2);
        let end = find_cut(chars, min_end, hard_end).unwrap_or(hard_end);
        spans.push((start, end));

        let latest_start = end - config.overlap_chars;
        let earliest_start = (start + 1).max(latest_start.saturating_sub(config.overlap_chars / 2));
        let next = find_cut(chars, earliest_start, latest_start).unwrap_or(latest_start);

        start = next;
    }

    Ok(spans)
}

/// Latest position in `[lower, upper]` sitting on the strongest available boundary.
fn find_cut(chars: &[char], lower: usize, upper: usize) -> Option<usize> {
    if lower > upper {
        return None;
    }

    BOUNDARIES.iter().find_map(|kind| {
        (lower..=upper)
            .rev()
            .find(|&position| is_boundary(chars, position, *kind))
    })
}

fn is_boundary(chars: &[char], position: usize, kind: Boundary) -> bool {
    if position == 0 || position > chars.len() {
        return false;
    }

    let previous = chars[position - 1];
    match kind {
        Boundary::Paragraph => position >= 2 && previous == '\n' && chars[position - 2] == '\n',
        Boundary::Line => previous == '\n',
        Boundary::Sentence => {
            position >= 2
                && previous.is_whitespace()
                && matches!(chars[position - 2], '.' | '!' | '?')
        }
        Boundary::Word => previous.is_whitespace(),
    }
}
