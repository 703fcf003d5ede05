use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Fallback avatar used when a model has no image of its own.
pub const DEFAULT_PROFILE_IMAGE: &str = "/static/favicon.png";

/// One catalog entry as served by the remote catalog.
///
/// Only the fields the panel reads or rewrites are typed. Everything else the
/// server sends (`params`, `object`, `pipe`, `openai`, ...) is kept in
/// `extra` and written back untouched, as are the opaque `base_model_id` and
/// `access_control` blobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owned_by: String,
    /// Parent model reference; passthrough only.
    #[serde(default)]
    pub base_model_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ModelMeta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// Read/write group and user lists; passthrough only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_control: Option<Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

/// Display metadata attached to a model.
///
/// Every field is optional; the `default` patch fills the gaps from
/// [`ModelMeta::fallback`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
    #[serde(default)]
    pub suggestion_prompts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Feature switches shown in the catalog. Servers add switches over time;
/// those land in `extra`. A switch the server left out stays out on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Capabilities {
    /// Both switches on, as used for newly filled metadata.
    fn default() -> Self {
        Self {
            vision: Some(true),
            citations: Some(true),
            extra: Map::new(),
        }
    }
}

/// A named tag on a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Map::new(),
        }
    }
}

impl ModelMeta {
    /// The values used to fill missing metadata.
    pub fn fallback() -> Self {
        Self {
            profile_image_url: Some(DEFAULT_PROFILE_IMAGE.to_string()),
            description: Some(" ".to_string()),
            capabilities: Some(Capabilities::default()),
            suggestion_prompts: None,
            tags: Some(Vec::new()),
            extra: Map::new(),
        }
    }

    /// Fill every absent field from `defaults`, keeping present values.
    pub fn filled_from(&self, defaults: &ModelMeta) -> Self {
        let mut extra = defaults.extra.clone();
        extra.extend(self.extra.clone());
        Self {
            profile_image_url: self
                .profile_image_url
                .clone()
                .or_else(|| defaults.profile_image_url.clone()),
            description: self
                .description
                .clone()
                .or_else(|| defaults.description.clone()),
            capabilities: self
                .capabilities
                .clone()
                .or_else(|| defaults.capabilities.clone()),
            suggestion_prompts: self
                .suggestion_prompts
                .clone()
                .or_else(|| defaults.suggestion_prompts.clone()),
            tags: self.tags.clone().or_else(|| defaults.tags.clone()),
            extra,
        }
    }
}

impl Model {
    /// Minimal model with only an id, as found in sparse imports.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            owned_by: String::new(),
            base_model_id: None,
            meta: None,
            tags: Vec::new(),
            access_control: None,
            is_active: true,
            created_at: None,
            updated_at: None,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.description.as_deref())
    }

    pub fn profile_image_url(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.profile_image_url.as_deref())
    }

    /// JSON body for the create endpoint.
    ///
    /// The model's own top-level fields are laid over a fixed skeleton, so a
    /// sparse model still arrives with metadata, params and empty access
    /// lists.
    pub fn creation_body(&self) -> Result<Value, serde_json::Error> {
        let mut body = json!({
            "base_model_id": null,
            "meta": serde_json::to_value(ModelMeta::fallback())?,
            "params": {},
            "is_active": true,
            "access_control": {
                "read": { "group_ids": [], "user_ids": [] },
                "write": { "group_ids": [], "user_ids": [] }
            }
        });

        if let (Value::Object(skeleton), Value::Object(own)) =
            (&mut body, serde_json::to_value(self)?)
        {
            skeleton.extend(own);
        }
        Ok(body)
    }
}
