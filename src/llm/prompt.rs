use serde_json::Value;

use crate::constraints::Constraints;
use crate::llm::providers::ProviderError;
use crate::models::TechStackItem;

/// Longest description forwarded to a provider, in characters.
const MAX_PROMPT_DESCRIPTION_CHARS: usize = 2_000;
const MAX_PROMPT_REQUIREMENTS: usize = 20;

/// Stack and explanation parsed out of a provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedStack {
    pub primary_tech_stack: Vec<TechStackItem>,
    pub explanation: String,
}

/// Remove control characters (other than newlines) and cap the length so user
/// text cannot break out of the prompt layout.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\t' { ' ' } else { c })
        .filter(|c| *c == '\n' || !c.is_control())
        .take(MAX_PROMPT_DESCRIPTION_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}

/// The single prompt sent to every provider. It pins the response schema
/// with one worked example.
pub fn build_prompt(
    description: &str,
    requirements: &[String],
    constraints: &Constraints,
) -> String {
    let description = sanitize_for_prompt(description);
    let requirements: Vec<String> = requirements
        .iter()
        .map(|r| sanitize_for_prompt(r))
        .filter(|r| !r.is_empty())
        .take(MAX_PROMPT_REQUIREMENTS)
        .collect();

    let requirements_block = if requirements.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = requirements.iter().map(|r| format!("- {r}")).collect();
        format!("Requirements:\n{}\n\n", lines.join("\n"))
    };

    let constraint_lines: Vec<String> = constraints
        .categories()
        .filter_map(|category| {
            let tokens: Vec<String> = constraints
                .tokens_for(category)
                .iter()
                .map(|t| sanitize_for_prompt(t))
                .collect();
            let required = sanitize_for_prompt(&constraints.required_for(category)?);
            let mut line = format!("- {}: use {required}", sanitize_for_prompt(category));
            if tokens.len() > 1 {
                line.push_str(&format!(", avoid {}", tokens[1..].join(", ")));
            }
            Some(line)
        })
        .collect();
    let constraints_block = if constraint_lines.is_empty() {
        String::new()
    } else {
        format!("Constraints:\n{}\n\n", constraint_lines.join("\n"))
    };

    format!(
        "You are a senior software architect. Recommend a technology stack for the \
         project described below.\n\n\
         Project description: \"{description}\"\n\n\
         {requirements_block}\
         {constraints_block}\
         Respond with ONLY a JSON object with exactly two keys:\n\
         - \"primary_tech_stack\": an array of objects, each with a \"category\" and a \"name\"\n\
         - \"explanation\": a string explaining why the stack fits the project\n\
         Use categories such as frontend, backend, database, devops, mobile, language, \
         testing, orm and api. No markdown, no extra keys, no text outside the JSON.\n\n\
         Example:\n\
         {{\"primary_tech_stack\": [{{\"category\": \"frontend\", \"name\": \"React\"}}, \
         {{\"category\": \"backend\", \"name\": \"Node.js\"}}, \
         {{\"category\": \"database\", \"name\": \"PostgreSQL\"}}], \
         \"explanation\": \"React and Node.js share one language across the stack, and \
         PostgreSQL handles relational data reliably.\"}}"
    )
}

/// Strip an optional Markdown code fence (```json ... ```) around `content`.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // info string ("json") may be followed by a newline or sit on the same line
    let body = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    body.trim().trim_end_matches("```").trim()
}

/// Parse a provider response into a stack. Anything other than a JSON object
/// with a non-empty `primary_tech_stack` of `{category, name}` entries and a
/// string `explanation` is rejected.
pub fn parse_stack_response(content: &str) -> Result<GeneratedStack, ProviderError> {
    let json = strip_code_fence(content);
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ProviderError::Malformed(format!("not valid JSON: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| ProviderError::Malformed("response is not a JSON object".to_string()))?;

    let items = object
        .get("primary_tech_stack")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::Malformed("missing `primary_tech_stack` array".to_string()))?;

    let explanation = object
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::trim)
        .ok_or_else(|| ProviderError::Malformed("missing `explanation` string".to_string()))?;

    let mut primary_tech_stack = Vec::with_capacity(items.len());
    for item in items {
        let field = |key: &str| {
            item.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        match (field("category"), field("name")) {
            (Some(category), Some(name)) => {
                primary_tech_stack.push(TechStackItem::new(name, category.to_lowercase()));
            }
            _ => {
                return Err(ProviderError::Malformed(format!(
                    "stack entry without category/name: {item}"
                )))
            }
        }
    }

    if primary_tech_stack.is_empty() {
        return Err(ProviderError::Malformed(
            "`primary_tech_stack` is empty".to_string(),
        ));
    }

    Ok(GeneratedStack {
        primary_tech_stack,
        explanation: explanation.to_string(),
    })
}
