use serde::{Deserialize, Serialize};

use crate::models::{Model, ModelMeta, Tag};

/// Registry name of the edit patch for one model.
pub fn edit_patch_name(model_id: &str) -> String {
    format!("edit/{}", model_id)
}

/// Manual overrides for a single model. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub profile_image_url: Option<String>,
    /// Comma separated tag names, e.g. `"chat, vision"`.
    pub tags: Option<String>,
}

impl ModelEdit {
    /// Build the patch that applies this edit to `model_id` only.
    pub fn into_patch(self, model_id: &str) -> impl Fn(&Model) -> Model + Send + Sync {
        let model_id = model_id.to_string();
        move |model: &Model| {
            if model.id != model_id {
                return model.clone();
            }
            self.apply_to(model)
        }
    }

    fn apply_to(&self, model: &Model) -> Model {
        let mut edited = model.clone();
        if let Some(name) = &self.name {
            edited.name = name.clone();
        }
        if self.description.is_some() || self.profile_image_url.is_some() {
            let meta = edited.meta.get_or_insert_with(ModelMeta::default);
            if let Some(description) = &self.description {
                meta.description = Some(description.clone());
            }
            if let Some(url) = &self.profile_image_url {
                meta.profile_image_url = Some(url.clone());
            }
        }
        if let Some(tags) = &self.tags {
            edited.tags = parse_tag_list(tags);
        }
        edited
    }
}

/// Split a comma separated tag string, dropping blanks.
pub fn parse_tag_list(input: &str) -> Vec<Tag> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(Tag::new)
        .collect()
}
