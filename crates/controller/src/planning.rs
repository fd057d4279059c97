//! Plan-and-Solve support.
//!
//! A separate planner model breaks the task into numbered steps before the
//! first action and revises the plan periodically from the step history.

use std::sync::Arc;

use browzee_core::{
    traits::LlmClient,
    types::{ChatMessage, StepRecord},
    Error, Result,
};

/// A step in the execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub id: usize,
    pub description: String,
}

pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Generate (or revise) a plan for `task` given what has happened so far.
    pub async fn plan(&self, task: &str, history: &[StepRecord]) -> Result<Vec<PlanStep>> {
        let mut prompt = format!(
            "You are an expert planner for a web browsing agent. Break down the following task into a clear, numbered list of steps.\n\
            Task: {}\n",
            task
        );
        if !history.is_empty() {
            prompt.push_str("\nSteps already taken:\n");
            for step in history.iter().rev().take(10).rev() {
                prompt.push_str(&format!("{}. {} -> {}\n", step.index, step.action.describe(), first_line(&step.result)));
            }
            prompt.push_str("\nRevise the remaining plan accordingly.\n");
        }
        prompt.push_str(
            "Return ONLY the numbered list, nothing else. Example:\n\
            1. Open the airline website\n\
            2. Search for flights\n\
            3. Select the cheapest option",
        );

        let response = self
            .llm
            .ainvoke(&[ChatMessage::user(prompt)])
            .await
            .map_err(|e| Error::model(format!("Failed to generate plan: {}", e)))?;

        let steps = parse_plan(&response.text());
        if steps.is_empty() {
            // Fallback if the model ignores the format
            return Ok(vec![PlanStep {
                id: 1,
                description: format!("Complete the task: {}", task),
            }]);
        }
        Ok(steps)
    }

    pub fn format_plan(steps: &[PlanStep]) -> String {
        let mut out = String::from("Current plan:\n");
        for step in steps {
            out.push_str(&format!("{}. {}\n", step.id, step.description));
        }
        out
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or_default()
}

fn parse_plan(text: &str) -> Vec<PlanStep> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            // Remove "1. " or "1) " prefix if present
            let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
            let rest = &line[digits..];
            match rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
                Some(stripped) if digits > 0 => stripped.trim(),
                _ => line.trim_start_matches(['-', '*']).trim(),
            }
        })
        .filter(|d| !d.is_empty())
        .enumerate()
        .map(|(i, d)| PlanStep {
            id: i + 1,
            description: d.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use browzee_core::mocks::MockLlm;

    #[test]
    fn test_parse_plan() {
        let steps = parse_plan("1. Open site\n2) Search\n\n- Pay");
        assert_eq!(
            steps.iter().map(|s| s.description.as_str()).collect::<Vec<_>>(),
            vec!["Open site", "Search", "Pay"]
        );
        assert_eq!(steps[2].id, 3);
    }

    #[tokio::test]
    async fn test_plan_fallback_and_format() {
        let planner = Planner::new(Arc::new(MockLlm::constant("   ")));
        let steps = planner.plan("buy milk", &[]).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(
            Planner::format_plan(&steps),
            "Current plan:\n1. Complete the task: buy milk\n"
        );
    }
}
