//! Context Assembler. Pure, synchronous, no I/O — groups chunks by act,
//! renders a token-budgeted context, builds the two Polish prompt
//! templates, and extracts sources.

pub mod prompts;

use serde::{Deserialize, Serialize};

use crate::domain::act::Act;
use crate::domain::chunk::Chunk;
use crate::domain::source::Source;

/// Chars-per-token approximation used for the cheap token-budget estimate.
/// Good enough for Polish text; not a real tokenizer.
const CHARS_PER_TOKEN: usize = 4;

const TRUNCATION_MARKER: &str = "\n\n[TREŚĆ SKRÓCONA]";

const MAX_RELATED_ACTS_RENDERED: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    pub token_budget: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self { token_budget: 4000 }
    }
}

pub struct ContextAssembler {
    config: AssemblerConfig,
}

impl ContextAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    /// Groups `chunks` by `act_id` preserving first-seen order, renders a
    /// header per group followed by `[Fragment N]`-labeled chunk bodies,
    /// then a separate "related acts" section (title-only, capped at 5),
    /// and truncates to the token budget if needed.
    pub fn render(&self, chunks: &[Chunk], related: &[Act]) -> String {
        let mut rendered = String::new();
        let mut seen_acts: Vec<&str> = Vec::new();
        for chunk in chunks {
            if !seen_acts.contains(&chunk.act.id.as_str()) {
                seen_acts.push(chunk.act.id.as_str());
            }
        }

        for act_id in &seen_acts {
            let act_chunks = chunks.iter().filter(|c| c.act.id == *act_id);
            let title = chunks
                .iter()
                .find(|c| c.act.id == *act_id)
                .map(|c| c.act.title.as_str())
                .unwrap_or(*act_id);
            rendered.push_str(&format!("## {title}\n"));
            for chunk in act_chunks {
                rendered.push_str(&format!(
                    "[Fragment {}] {}\n",
                    chunk.chunk_index + 1,
                    chunk.content
                ));
            }
        }

        if !related.is_empty() {
            rendered.push_str("## Powiązane akty prawne\n");
            for act in related.iter().take(MAX_RELATED_ACTS_RENDERED) {
                rendered.push_str(&format!("- {}\n", act.title));
            }
        }

        self.truncate_to_budget(rendered)
    }

    fn truncate_to_budget(&self, rendered: String) -> String {
        let max_chars = self.config.token_budget * CHARS_PER_TOKEN;
        if rendered.chars().count() <= max_chars {
            return rendered;
        }
        let truncated: String = rendered.chars().take(max_chars).collect();
        format!("{truncated}{TRUNCATION_MARKER}")
    }

    pub fn build_system_prompt(&self, tier: PromptTier) -> String {
        match tier {
            PromptTier::Fast => prompts::SYSTEM_PROMPT.to_string(),
            PromptTier::Accurate => {
                format!("{}\n\n{}", prompts::SYSTEM_PROMPT, prompts::ACCURATE_ADDENDUM)
            }
        }
    }

    pub fn build_user_prompt(&self, question: &str, context: &str) -> String {
        format!(
            "{}\n\nPytanie: {question}\n\nKontekst:\n{context}",
            prompts::USER_PROMPT_PREAMBLE
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTier {
    Fast,
    Accurate,
}

/// Seam for a future NLP-based citation extractor: the pipeline depends
/// only on this trait, not on the minimum-viable implementation below.
pub trait ExtractSources {
    fn extract_sources(&self, generated_text: &str, chunks: &[Chunk]) -> Vec<Source>;
}

const MAX_SOURCES: usize = 10;

/// Minimum-viable source extractor: one `Source` per unique `act_id` seen
/// in `chunks`, independent of `generated_text`.
pub struct ActDedupSourceExtractor;

impl ExtractSources for ActDedupSourceExtractor {
    fn extract_sources(&self, _generated_text: &str, chunks: &[Chunk]) -> Vec<Source> {
        let mut seen = Vec::new();
        let mut sources = Vec::new();

        for chunk in chunks {
            if seen.contains(&chunk.act_id) {
                continue;
            }
            seen.push(chunk.act_id.clone());
            sources.push(Source {
                act_title: chunk.act.title.clone(),
                article_label: format!("Fragment {}", chunk.chunk_index + 1),
                external_link: external_link_for(chunk.act.year, chunk.act.position),
                chunk_id: chunk.id.clone(),
            });
            if sources.len() >= MAX_SOURCES {
                break;
            }
        }

        sources
    }
}

fn external_link_for(year: u16, position: u32) -> String {
    format!("https://isap.sejm.gov.pl/isap.nsf/DocDetails.xsp?id=WDU{year}{position:04}")
}
