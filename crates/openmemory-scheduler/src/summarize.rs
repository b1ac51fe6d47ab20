//! Reflection summarization seam.
//!
//! Production deployments plug an LLM-backed collaborator in here; the
//! default is a deterministic extractive summarizer so reflection works
//! offline.

use openmemory_core::models::MemoryItem;

pub trait Summarizer: Send + Sync {
    /// Produce a reflective summary of recent items. Inputs arrive newest
    /// first.
    fn summarize(&self, items: &[MemoryItem]) -> String;
}

/// Takes the first sentence of the highest-salience items.
pub struct ExtractiveSummarizer {
    pub max_sentences: usize,
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self { max_sentences: 5 }
    }
}

impl Summarizer for ExtractiveSummarizer {
    fn summarize(&self, items: &[MemoryItem]) -> String {
        let mut ranked: Vec<&MemoryItem> = items.iter().collect();
        ranked.sort_by(|a, b| {
            b.salience
                .partial_cmp(&a.salience)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let sentences: Vec<&str> = ranked
            .iter()
            .take(self.max_sentences)
            .filter_map(|item| first_sentence(&item.content))
            .collect();
        sentences.join(" ")
    }
}

fn first_sentence(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.find(['.', '!', '?']) {
        Some(pos) => Some(trimmed[..=pos].trim()),
        None => Some(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmemory_core::Sector;

    #[test]
    fn summary_prefers_salient_items() {
        let mut low = MemoryItem::new("u1", "low priority detail.", Sector::Semantic);
        low.salience = 0.1;
        let mut high = MemoryItem::new("u1", "the key insight of the week. And more.", Sector::Semantic);
        high.salience = 0.9;

        let summarizer = ExtractiveSummarizer { max_sentences: 1 };
        let summary = summarizer.summarize(&[low, high]);
        assert_eq!(summary, "the key insight of the week.");
    }

    #[test]
    fn empty_input_gives_empty_summary() {
        let summarizer = ExtractiveSummarizer::default();
        assert_eq!(summarizer.summarize(&[]), "");
    }
}
