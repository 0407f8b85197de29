use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{next_timestamp, sort_newest_first, TemplateStore};
use crate::error::FormResult;
use crate::types::{Template, TemplateDraft};

/// Process-local store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    templates: RwLock<HashMap<String, Template>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn write_one(templates: &mut HashMap<String, Template>, draft: TemplateDraft) -> Template {
    let key = draft.key.to_string();
    let template = match templates.get(&key) {
        Some(existing) => {
            let updated_at = next_timestamp(Some(existing.updated_at));
            draft.into_template(existing.created_at, updated_at)
        }
        None => {
            let now = next_timestamp(None);
            draft.into_template(now, now)
        }
    };
    templates.insert(key, template.clone());
    template
}

#[async_trait]
impl TemplateStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list(&self) -> FormResult<Vec<Template>> {
        let mut items: Vec<Template> = self.templates.read().await.values().cloned().collect();
        sort_newest_first(&mut items);
        Ok(items)
    }

    async fn get(&self, key: &str) -> FormResult<Option<Template>> {
        Ok(self.templates.read().await.get(key).cloned())
    }

    async fn upsert(&self, draft: TemplateDraft) -> FormResult<Template> {
        let mut templates = self.templates.write().await;
        Ok(write_one(&mut templates, draft))
    }

    async fn upsert_many(&self, drafts: Vec<TemplateDraft>) -> FormResult<Vec<Template>> {
        let mut templates = self.templates.write().await;
        Ok(drafts
            .into_iter()
            .map(|draft| write_one(&mut templates, draft))
            .collect())
    }

    async fn remove(&self, key: &str) -> FormResult<bool> {
        Ok(self.templates.write().await.remove(key).is_some())
    }
}
