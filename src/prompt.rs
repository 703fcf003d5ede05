//! Prompt text for generating model names, descriptions and tags.
//!
//! Only the prompt is built. It is logged and handed back to the caller; no
//! text-generation service is contacted.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Model;

const NAME_TEMPLATE: &str = "Generate a display name for each LLM model from its id, name and description. Follow the style of the examples.
<examples>
{{examples}}
</examples>

<models>
{{models}}
</models>

## Output as CSV

|id|name|
|------|------|
";

const DESCRIPTION_TEMPLATE: &str = "Write a short description for each AI model covering its strengths, capabilities and typical use.
<examples>
{{examples}}
</examples>

<models>
{{models}}
</models>

## Output as CSV

|id|desc|
|------|------|
";

const TAGS_TEMPLATE: &str = "Suggest 3-5 tags for each model based on its strengths and typical use. Each tag is a single word or short phrase.
<examples>
{{examples}}
</examples>

<models>
{{models}}
</models>

<available-tags>
{{tags}}
</available-tags>

## Output as CSV
Separate tags with commas.
|id|tags|
|------|------|
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Name,
    Description,
    Tags,
}

impl PromptKind {
    pub fn default_template(&self) -> &'static str {
        match self {
            Self::Name => NAME_TEMPLATE,
            Self::Description => DESCRIPTION_TEMPLATE,
            Self::Tags => TAGS_TEMPLATE,
        }
    }
}

/// What to put into a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub kind: PromptKind,
    /// Overrides the kind's default template.
    #[serde(default)]
    pub template: Option<String>,
    /// Ids of models shown as examples.
    #[serde(default)]
    pub examples: Vec<String>,
    /// Ids to operate on. `None` means every non-example model.
    #[serde(default)]
    pub targets: Option<Vec<String>>,
}

/// `name: description` per line.
fn example_lines(models: &[&Model]) -> String {
    models
        .iter()
        .map(|m| format!("{}: {}", m.name, m.description().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn meta_tag_text(tag: &Value) -> String {
    match tag {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| tag.to_string()),
        other => other.to_string(),
    }
}

/// Markdown table of the models to process.
fn model_table(models: &[&Model]) -> String {
    let mut table = String::from("|id|name|desc|tags|\n|---|---|---|---|");
    for m in models {
        let tags = m
            .meta
            .as_ref()
            .and_then(|meta| meta.tags.as_ref())
            .map(|tags| tags.iter().map(meta_tag_text).collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        table.push_str(&format!(
            "\n|{}|{}|{}|{}|",
            m.id,
            m.name,
            m.description().unwrap_or_default(),
            tags
        ));
    }
    table
}

/// Distinct top-level tag names, first occurrence wins.
pub fn collect_tags(models: &[Model]) -> Vec<String> {
    let mut seen = HashSet::new();
    models
        .iter()
        .flat_map(|m| m.tags.iter())
        .filter(|t| !t.name.is_empty() && seen.insert(t.name.clone()))
        .map(|t| t.name.clone())
        .collect()
}

/// Render a prompt. `effective` supplies examples and targets, `raw` the tag
/// vocabulary.
pub fn build_prompt(request: &PromptRequest, effective: &[Model], raw: &[Model]) -> String {
    let is_example = |m: &Model| request.examples.iter().any(|id| *id == m.id);

    let examples: Vec<&Model> = effective.iter().filter(|m| is_example(*m)).collect();
    let targets: Vec<&Model> = effective
        .iter()
        .filter(|m| !is_example(*m))
        .filter(|m| match &request.targets {
            Some(ids) => ids.iter().any(|id| *id == m.id),
            None => true,
        })
        .collect();

    let template = request
        .template
        .as_deref()
        .unwrap_or_else(|| request.kind.default_template());

    let prompt = template
        .replacen("{{examples}}", &example_lines(&examples), 1)
        .replacen("{{models}}", &model_table(&targets), 1)
        .replacen("{{tags}}", &collect_tags(raw).join(", "), 1);

    tracing::info!(
        "Built {:?} prompt for {} model(s) with {} example(s):\n{}",
        request.kind,
        targets.len(),
        examples.len(),
        prompt
    );
    prompt
}
