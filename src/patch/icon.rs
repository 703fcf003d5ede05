//! Icon assignment from the lobehub static icon packages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Model, ModelMeta};

/// Registry name of the icon patch.
pub const ICON_PATCH: &str = "icon/preview";

pub const DEFAULT_MATCHING_RULES: &str = "gpt:openai\npplx|sonar:perplexity\n";

/// Icons bundled with the crate: `(name, has colour variant)`.
const BUILTIN_ICONS: &[(&str, bool)] = &[
    ("ai21", false),
    ("anthropic", false),
    ("baichuan", true),
    ("bytedance", true),
    ("chatglm", true),
    ("claude", true),
    ("cohere", true),
    ("deepseek", true),
    ("doubao", true),
    ("gemini", true),
    ("gemma", true),
    ("grok", false),
    ("hunyuan", true),
    ("kimi", true),
    ("llama", false),
    ("meta", true),
    ("minimax", true),
    ("mistral", true),
    ("moonshot", false),
    ("ollama", false),
    ("openai", false),
    ("openrouter", false),
    ("perplexity", true),
    ("qwen", true),
    ("spark", true),
    ("stepfun", true),
    ("wenxin", true),
    ("yi", true),
    ("zhipu", true),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconCdn {
    #[default]
    Npmmirror,
    Unpkg,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconFormat {
    #[default]
    Svg,
    Png,
}

impl IconFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }

    fn directory(&self) -> &'static str {
        match self {
            Self::Svg => "icons",
            Self::Png => "light",
        }
    }
}

/// One icon known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconEntry {
    pub name: String,
    pub color: bool,
}

/// The icons the matcher may choose from, in lookup order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconCatalog {
    entries: Vec<IconEntry>,
}

impl IconCatalog {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_ICONS
                .iter()
                .map(|(name, color)| IconEntry {
                    name: name.to_string(),
                    color: *color,
                })
                .collect(),
        }
    }

    /// Parse the `{"openai": {}, "claude": {"color": true}, ...}` listing,
    /// keeping its key order as the lookup order.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let listing: serde_json::Map<String, Value> = serde_json::from_str(text)?;
        let entries = listing
            .into_iter()
            .map(|(name, variants)| IconEntry {
                color: variants
                    .get("color")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                name,
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[IconEntry] {
        &self.entries
    }

    pub fn has_color(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name && e.color)
    }
}

impl Default for IconCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// How icons are matched and where their URLs point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconPatchConfig {
    pub cdn: IconCdn,
    pub format: IconFormat,
    pub use_color: bool,
    /// One `key1|key2:icon` rule per line.
    pub matching_rules: String,
}

impl Default for IconPatchConfig {
    fn default() -> Self {
        Self {
            cdn: IconCdn::default(),
            format: IconFormat::default(),
            use_color: false,
            matching_rules: DEFAULT_MATCHING_RULES.to_string(),
        }
    }
}

/// Parse matching rules into `icon -> [keys]`.
///
/// Lines without a `:` or with an empty side are skipped. Anything after a
/// second `:` is ignored.
pub fn parse_matching_rules(rules: &str) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for line in rules.lines() {
        let mut parts = line.trim().split(':');
        let (Some(keys), Some(icon)) = (parts.next(), parts.next()) else {
            continue;
        };
        let (keys, icon) = (keys.trim(), icon.trim());
        if keys.is_empty() || icon.is_empty() {
            continue;
        }
        map.entry(icon.to_string())
            .or_default()
            .extend(keys.split('|').map(|k| k.to_string()));
    }
    map
}

fn matches_model(key: &str, model: &Model) -> bool {
    model.id.contains(key) || model.name.contains(key)
}

/// First catalog icon whose name, or one of its rule keys, occurs in the
/// model id or name.
pub fn match_icon<'a>(
    model: &Model,
    catalog: &'a IconCatalog,
    rules: &HashMap<String, Vec<String>>,
) -> Option<&'a str> {
    catalog
        .entries()
        .iter()
        .find(|entry| {
            let by_rule = rules
                .get(&entry.name)
                .is_some_and(|keys| keys.iter().any(|k| matches_model(k, model)));
            by_rule || matches_model(&entry.name, model)
        })
        .map(|entry| entry.name.as_str())
}

/// CDN URL of an icon under the given config.
pub fn icon_url(config: &IconPatchConfig, catalog: &IconCatalog, name: &str) -> String {
    let format = config.format.as_str();
    let package = format!("@lobehub/icons-static-{}", format);
    let suffix = if config.use_color && catalog.has_color(name) {
        "-color"
    } else {
        ""
    };
    let path = format!("{}/{}{}.{}", config.format.directory(), name, suffix, format);

    match config.cdn {
        IconCdn::Npmmirror => format!(
            "https://registry.npmmirror.com/{}/latest/files/{}",
            package, path
        ),
        IconCdn::Unpkg => format!("https://unpkg.com/{}@latest/{}", package, path),
    }
}

/// Build the `icon/preview` patch. Models without a matching icon pass
/// through unchanged.
pub fn icon_patch(
    config: IconPatchConfig,
    catalog: IconCatalog,
) -> impl Fn(&Model) -> Model + Send + Sync {
    let rules = parse_matching_rules(&config.matching_rules);
    move |model: &Model| {
        let Some(name) = match_icon(model, &catalog, &rules) else {
            return model.clone();
        };
        let mut meta = model.meta.clone().unwrap_or_else(ModelMeta::default);
        meta.profile_image_url = Some(icon_url(&config, &catalog, name));
        Model {
            meta: Some(meta),
            ..model.clone()
        }
    }
}
