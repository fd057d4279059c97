use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use browzee_core::{
    traits::{FactStore, LlmClient},
    types::ChatMessage,
    Result,
};

/// Summary used when nothing is known about the user.
pub const NO_KNOWN_INFORMATION: &str = "No known user information.";

const FACT_PREFIX: &str = "fact_";

/// Short-term conversation plus long-term facts for one user.
pub struct MemoryStore {
    user_id: String,
    short_term: Mutex<Vec<ChatMessage>>,
    facts: Arc<dyn FactStore>,
    // Serialises the load, extract, save cycle of `record_facts`
    write_lock: tokio::sync::Mutex<()>,
}

impl MemoryStore {
    pub fn new(user_id: impl Into<String>, facts: Arc<dyn FactStore>) -> Self {
        Self {
            user_id: user_id.into(),
            short_term: Mutex::new(Vec::new()),
            facts,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn history(&self) -> MutexGuard<'_, Vec<ChatMessage>> {
        self.short_term.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Short-term
    // =========================================================================

    pub fn append_user_message(&self, text: impl Into<String>) {
        self.history().push(ChatMessage::user(text));
    }

    pub fn append_assistant_message(&self, text: impl Into<String>) {
        self.history().push(ChatMessage::assistant(text));
    }

    pub fn short_term_messages(&self) -> Vec<ChatMessage> {
        self.history().clone()
    }

    pub fn clear_short_term(&self) {
        self.history().clear();
    }

    // =========================================================================
    // Long-term
    // =========================================================================

    pub async fn long_term_snapshot(&self) -> Result<BTreeMap<String, String>> {
        self.facts.load(&self.user_id).await
    }

    /// Known facts rendered for a system prompt.
    pub async fn as_context_summary(&self) -> String {
        match self.long_term_snapshot().await {
            Ok(facts) => render_summary(&facts),
            Err(e) => {
                tracing::warn!(user = %self.user_id, error = %e, "Long-term memory unreadable");
                NO_KNOWN_INFORMATION.to_string()
            }
        }
    }

    /// Ask the LLM for new facts in `text` and persist them.
    ///
    /// Returns the facts actually added. Failures are logged and yield an
    /// empty list. Concurrent calls on the same store run one at a time.
    pub async fn record_facts(&self, llm: &dyn LlmClient, text: &str) -> Vec<String> {
        match self.try_record_facts(llm, text).await {
            Ok(added) => added,
            Err(e) => {
                tracing::warn!(user = %self.user_id, error = %e, "Failed to update long-term memory");
                Vec::new()
            }
        }
    }

    async fn try_record_facts(&self, llm: &dyn LlmClient, text: &str) -> Result<Vec<String>> {
        let _guard = self.write_lock.lock().await;
        let existing = self.long_term_snapshot().await?;
        let prompt = extraction_prompt(&render_summary(&existing), text);

        let response = llm.ainvoke(&[ChatMessage::user(prompt)]).await?;
        let candidates = parse_facts(&response.text());
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut known: HashSet<String> = existing.values().map(|v| v.to_lowercase()).collect();
        let added: Vec<String> = candidates
            .into_iter()
            .filter(|fact| known.insert(fact.to_lowercase()))
            .collect();
        if added.is_empty() {
            return Ok(Vec::new());
        }

        let mut updated = existing;
        let mut next = next_fact_index(&updated);
        for fact in &added {
            updated.insert(format!("{}{}", FACT_PREFIX, next), fact.clone());
            next += 1;
        }
        self.facts.save(&self.user_id, &updated).await?;

        tracing::info!(user = %self.user_id, added = added.len(), "Recorded new facts");
        Ok(added)
    }
}

fn render_summary(facts: &BTreeMap<String, String>) -> String {
    if facts.is_empty() {
        return NO_KNOWN_INFORMATION.to_string();
    }
    let mut entries: Vec<(Option<u64>, &String)> = facts
        .iter()
        .map(|(k, v)| (fact_index(k), v))
        .collect();
    // fact_2 before fact_10
    entries.sort_by_key(|(idx, _)| idx.unwrap_or(u64::MAX));
    let lines: Vec<String> = entries.iter().map(|(_, v)| format!("- {}", v)).collect();
    format!("Known user information:\n{}", lines.join("\n"))
}

fn fact_index(key: &str) -> Option<u64> {
    key.strip_prefix(FACT_PREFIX)?.parse().ok()
}

fn next_fact_index(facts: &BTreeMap<String, String>) -> u64 {
    facts
        .keys()
        .filter_map(|k| fact_index(k))
        .max()
        .map(|m| m + 1)
        .unwrap_or(0)
}

fn extraction_prompt(existing: &str, text: &str) -> String {
    format!(
        "You are a memory agent. Your task is to extract any important new facts about the user \
or the world that should be remembered long term.\n\n\
Existing memory:\n\"\"\"{}\"\"\"\n\n\
New text:\n\"\"\"{}\"\"\"\n\n\
Return only new facts that are not already known. Respond with a list of concise facts, \
one per line. If nothing new, return an empty list.",
        existing, text
    )
}

/// Split an LLM answer into candidate facts.
fn parse_facts(response: &str) -> Vec<String> {
    let trimmed = response.trim();
    if is_empty_answer(trimmed) {
        return Vec::new();
    }

    trimmed
        .lines()
        .map(strip_marker)
        .filter(|line| !line.is_empty() && !is_empty_answer(line))
        .map(String::from)
        .collect()
}

fn is_empty_answer(s: &str) -> bool {
    let lower = s.trim().trim_end_matches('.').to_lowercase();
    matches!(lower.as_str(), "" | "none" | "[]" | "n/a" | "nothing new")
}

/// Remove bullets (`-`, `*`, `•`) and numbering (`1.`, `2)`).
fn strip_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(['-', '*', '•']).trim_start();

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return stripped.trim();
        }
    }
    line.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_facts_strips_markers() {
        let facts = parse_facts("- Likes tea\n* Lives in Oslo\n3. Has a dog\n4) Works nights\n\n");
        assert_eq!(
            facts,
            vec!["Likes tea", "Lives in Oslo", "Has a dog", "Works nights"]
        );
    }

    #[test]
    fn test_parse_facts_empty_answers() {
        assert!(parse_facts("").is_empty());
        assert!(parse_facts("None").is_empty());
        assert!(parse_facts("none.").is_empty());
        assert!(parse_facts("[]").is_empty());
        assert!(parse_facts("  \n ").is_empty());
    }

    #[test]
    fn test_numbers_inside_facts_survive() {
        assert_eq!(strip_marker("2024 was a good year"), "2024 was a good year");
        assert_eq!(strip_marker("- 3 kids"), "3 kids");
    }

    #[test]
    fn test_summary_orders_numerically() {
        let mut facts = BTreeMap::new();
        facts.insert("fact_10".to_string(), "ten".to_string());
        facts.insert("fact_2".to_string(), "two".to_string());
        assert_eq!(render_summary(&facts), "Known user information:\n- two\n- ten");
        assert_eq!(next_fact_index(&facts), 11);
        assert_eq!(render_summary(&BTreeMap::new()), NO_KNOWN_INFORMATION);
    }
}
