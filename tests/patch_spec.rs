use llm_panel::models::*;
use llm_panel::patch::*;
use speculate2::speculate;

fn model(id: &str, name: &str) -> Model {
    Model::new(id).with_name(name)
}

fn with_description(id: &str, description: &str) -> Model {
    Model {
        meta: Some(ModelMeta {
            description: Some(description.to_string()),
            ..Default::default()
        }),
        ..Model::new(id)
    }
}

/// Sets `owned_by` to a fixed value.
fn set_owner(owner: &'static str) -> impl Fn(&Model) -> Model + Send + Sync {
    move |m: &Model| Model {
        owned_by: owner.to_string(),
        ..m.clone()
    }
}

/// Copies `owned_by` into `name`.
fn owner_into_name(m: &Model) -> Model {
    Model {
        name: m.owned_by.clone(),
        ..m.clone()
    }
}

speculate! {
    before {
        let models = vec![model("m1", "Alpha"), with_description("m2", "kept")];
    }

    describe "registry" {
        it "starts with the default patch" {
            let registry = PatchRegistry::with_default();
            assert_eq!(registry.names().collect::<Vec<_>>(), vec![DEFAULT_PATCH]);
        }

        it "keeps first registration position when a name is replaced" {
            let mut registry = PatchRegistry::new();
            registry.insert("a", set_owner("a"));
            registry.insert("b", set_owner("b"));
            let replaced = registry.insert("a", set_owner("a2"));

            assert!(replaced);
            assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);
            assert_eq!(registry.len(), 2);
        }

        it "reports fresh inserts as not replaced" {
            let mut registry = PatchRegistry::new();
            assert!(!registry.insert("a", set_owner("a")));
            assert!(registry.contains("a"));
            assert!(registry.get("missing").is_none());
        }
    }

    describe "active set" {
        it "starts with only default enabled" {
            let active = ActiveSet::new();
            assert_eq!(active.iter().collect::<Vec<_>>(), vec![DEFAULT_PATCH]);
        }

        it "reset empties it completely" {
            let mut active = ActiveSet::new();
            active.activate("icon/preview");
            active.reset();
            assert!(active.is_empty());
        }
    }

    describe "compose" {
        it "returns value-equal copies when nothing is active" {
            let registry = PatchRegistry::with_default();
            let out = compose(&models, &registry, &ActiveSet::empty());
            assert_eq!(out, models);
        }

        it "returns an empty list for empty input" {
            let out = compose(&[], &PatchRegistry::with_default(), &ActiveSet::new());
            assert!(out.is_empty());
        }

        it "keeps length, order and ids" {
            let mut registry = PatchRegistry::with_default();
            registry.insert("owner", set_owner("acme"));
            let active: ActiveSet = [DEFAULT_PATCH, "owner"].into_iter().collect();

            let out = compose(&models, &registry, &active);
            let ids: Vec<&str> = out.iter().map(|m| m.id.as_str()).collect();
            assert_eq!(ids, vec!["m1", "m2"]);
            assert!(out.iter().all(|m| m.owned_by == "acme"));
        }

        it "does not touch the input list" {
            let before = models.clone();
            let mut registry = PatchRegistry::new();
            registry.insert("owner", set_owner("acme"));
            let active: ActiveSet = ["owner"].into_iter().collect();

            let _ = compose(&models, &registry, &active);
            assert_eq!(models, before);
        }

        it "leaves no trace after activate then deactivate" {
            let mut registry = PatchRegistry::with_default();
            registry.insert("owner", set_owner("acme"));
            let mut active = ActiveSet::new();
            let baseline = compose(&models, &registry, &active);

            active.activate("owner");
            assert_ne!(compose(&models, &registry, &active), baseline);
            active.deactivate("owner");
            assert_eq!(compose(&models, &registry, &active), baseline);
        }

        it "applies patches in registration order regardless of activation order" {
            let mut registry = PatchRegistry::new();
            registry.insert("A", set_owner("from-a"));
            registry.insert("B", owner_into_name);

            let mut active = ActiveSet::empty();
            active.activate("B");
            active.activate("A");

            let out = compose(&models, &registry, &active);
            assert_eq!(out[0].name, "from-a");
        }

        it "treats active names missing from the registry as no-ops" {
            let registry = PatchRegistry::new();
            let active: ActiveSet = ["gone"].into_iter().collect();
            assert_eq!(compose(&models, &registry, &active), models);
        }

        it "runs default before icon/preview whatever the activation order" {
            let mut registry = PatchRegistry::with_default();
            registry.insert(ICON_PATCH, |m: &Model| Model {
                name: format!("meta-filled:{}", m.meta.is_some()),
                ..m.clone()
            });

            let mut active = ActiveSet::empty();
            active.activate(ICON_PATCH);
            active.activate(DEFAULT_PATCH);

            let out = compose(&[model("gpt-4o", "GPT-4o")], &registry, &active);
            assert_eq!(out[0].name, "meta-filled:true");
        }

        it "lets icon/preview override the default image" {
            let mut registry = PatchRegistry::with_default();
            registry.insert(ICON_PATCH, icon_patch(IconPatchConfig::default(), IconCatalog::builtin()));
            let active: ActiveSet = [ICON_PATCH, DEFAULT_PATCH].into_iter().collect();

            let out = compose(&[model("gpt-4o", "GPT-4o")], &registry, &active);
            assert_eq!(
                out[0].profile_image_url(),
                Some("https://registry.npmmirror.com/@lobehub/icons-static-svg/latest/files/icons/openai.svg")
            );
            assert_eq!(out[0].description(), Some(" "));
        }
    }

    describe "default patch" {
        it "fills an absent meta with fallbacks" {
            let out = fill_default_meta(&model("m1", "Alpha"));
            assert_eq!(out.meta, Some(ModelMeta::fallback()));
        }

        it "never overwrites an existing description" {
            let out = fill_default_meta(&with_description("m2", "kept"));
            let meta = out.meta.expect("meta");
            assert_eq!(meta.description.as_deref(), Some("kept"));
            assert_eq!(meta.profile_image_url.as_deref(), Some(DEFAULT_PROFILE_IMAGE));
            assert_eq!(meta.capabilities, Some(Capabilities::default()));
        }

        it "is idempotent" {
            let once = fill_default_meta(&models[0]);
            assert_eq!(fill_default_meta(&once), once);
        }
    }

    describe "icon patch" {
        it "matches through rule keys" {
            let patch = icon_patch(IconPatchConfig::default(), IconCatalog::builtin());
            let out = patch(&model("sonar-pro", "Sonar Pro"));
            assert!(out.profile_image_url().unwrap().ends_with("/icons/perplexity.svg"));
        }

        it "leaves unmatched models unchanged" {
            let patch = icon_patch(IconPatchConfig::default(), IconCatalog::builtin());
            let m = model("zz-unknown", "Nothing");
            assert_eq!(patch(&m), m);
        }

        it "uses colour variants only when the icon has one" {
            let config = IconPatchConfig { use_color: true, ..Default::default() };
            let catalog = IconCatalog::builtin();
            assert!(icon_url(&config, &catalog, "claude").ends_with("claude-color.svg"));
            assert!(icon_url(&config, &catalog, "openai").ends_with("openai.svg"));
        }

        it "loads a catalog listing" {
            let catalog = IconCatalog::from_json(r#"{"zeta": {}, "alpha": {"color": true}}"#).unwrap();
            assert!(catalog.has_color("alpha"));
            assert!(!catalog.has_color("zeta"));
            assert_eq!(catalog.entries().len(), 2);
        }
    }

    describe "edit patch" {
        it "only edits the targeted model" {
            let edit = ModelEdit {
                name: Some("Renamed".to_string()),
                tags: Some("chat, , vision".to_string()),
                ..Default::default()
            };
            let patch = edit.into_patch("m1");

            let edited = patch(&models[0]);
            assert_eq!(edited.name, "Renamed");
            assert_eq!(edited.tags, vec![Tag::new("chat"), Tag::new("vision")]);
            assert_eq!(patch(&models[1]), models[1]);
        }

        it "outlives the id it was built from" {
            let mut registry = PatchRegistry::new();
            let id = String::from("m1");
            let edit = ModelEdit {
                name: Some("Renamed".to_string()),
                ..Default::default()
            };
            registry.insert(edit_patch_name(&id), edit.into_patch(&id));
            drop(id);

            let active: ActiveSet = [edit_patch_name("m1")].into_iter().collect();
            let out = compose(&models, &registry, &active);
            assert_eq!(out[0].name, "Renamed");
            assert_eq!(out[1], models[1]);
        }

        it "sets description without dropping other meta" {
            let patch = ModelEdit {
                description: Some("new".to_string()),
                ..Default::default()
            }
            .into_patch("m2");
            let edited = patch(&fill_default_meta(&models[1]));
            assert_eq!(edited.description(), Some("new"));
            assert_eq!(edited.profile_image_url(), Some(DEFAULT_PROFILE_IMAGE));
        }
    }
}
