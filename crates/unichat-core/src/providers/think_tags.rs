//! Inline `<think>...</think>` extraction
//!
//! Some OpenAI-compatible and Ollama models stream their reasoning inside
//! the answer text. The splitter separates it incrementally; tags may be
//! split across chunks.

use super::error::CompletionResult;
use super::sequencer::EventSequencer;

const OPEN: &str = "<think>";
const CLOSE: &str = "</think>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Thinking(String),
}

/// Incremental splitter for tagged reasoning
#[derive(Debug, Default)]
pub struct ThinkTagSplitter {
    in_think: bool,
    pending: String,
}

impl ThinkTagSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one text chunk
    pub fn push(&mut self, chunk: &str) -> Vec<Segment> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.push_str(chunk);
        let mut out = Vec::new();

        loop {
            let tag = if self.in_think { CLOSE } else { OPEN };
            if let Some(pos) = buf.find(tag) {
                self.segment(&buf[..pos], &mut out);
                buf = buf[pos + tag.len()..].to_string();
                self.in_think = !self.in_think;
                continue;
            }
            // keep a possible partial tag for the next chunk
            let keep = (1..tag.len())
                .rev()
                .find(|k| buf.ends_with(&tag[..*k]))
                .unwrap_or(0);
            let split = buf.len() - keep;
            self.segment(&buf[..split], &mut out);
            self.pending = buf[split..].to_string();
            break;
        }
        out
    }

    /// Flush whatever is held back at end of stream
    pub fn flush(&mut self) -> Vec<Segment> {
        let rest = std::mem::take(&mut self.pending);
        let mut out = Vec::new();
        self.segment(&rest, &mut out);
        out
    }

    fn segment(&self, text: &str, out: &mut Vec<Segment>) {
        if text.is_empty() {
            return;
        }
        out.push(if self.in_think {
            Segment::Thinking(text.to_string())
        } else {
            Segment::Text(text.to_string())
        });
    }
}

/// Route segments into the sequencer
pub fn emit_segments(events: &mut EventSequencer, segments: Vec<Segment>) -> CompletionResult<()> {
    for segment in segments {
        match segment {
            Segment::Text(text) => events.text_delta(&text)?,
            Segment::Thinking(text) => events.thinking_delta(&text)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(chunks: &[&str]) -> Vec<Segment> {
        let mut splitter = ThinkTagSplitter::new();
        let mut out: Vec<Segment> = Vec::new();
        for chunk in chunks {
            out.extend(splitter.push(chunk));
        }
        out.extend(splitter.flush());
        // merge adjacent segments of the same kind for easier assertions
        let mut merged: Vec<Segment> = Vec::new();
        for seg in out {
            match (merged.last_mut(), seg) {
                (Some(Segment::Text(a)), Segment::Text(b)) => a.push_str(&b),
                (Some(Segment::Thinking(a)), Segment::Thinking(b)) => a.push_str(&b),
                (_, seg) => merged.push(seg),
            }
        }
        merged
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(feed(&["hello ", "world"]), vec![Segment::Text("hello world".into())]);
    }

    #[test]
    fn test_tags_in_one_chunk() {
        assert_eq!(
            feed(&["<think>plan</think>answer"]),
            vec![Segment::Thinking("plan".into()), Segment::Text("answer".into())]
        );
    }

    #[test]
    fn test_tags_split_across_chunks() {
        assert_eq!(
            feed(&["<thi", "nk>step one", " step two</th", "ink>", "done"]),
            vec![
                Segment::Thinking("step one step two".into()),
                Segment::Text("done".into())
            ]
        );
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        assert_eq!(feed(&["a <", "b"]), vec![Segment::Text("a <b".into())]);
        assert_eq!(feed(&["x <thin"]), vec![Segment::Text("x <thin".into())]);
    }
}
