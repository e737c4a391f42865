//! Rule template management service

use std::sync::Arc;

use chrono::Utc;

use crate::cache::TemplateCache;
use crate::classification::{bump_version, TemplateVersionMap};
use crate::error::{CoreError, CoreResult};
use crate::services::ServiceContext;
use crate::types::{
    CreateTemplateRequest, RuleTemplate, UpdateTemplateRequest, INITIAL_TEMPLATE_VERSION,
    TEMPLATE_ACTIONS,
};

/// Rule template management service
///
/// Sole writer of the `rule-templates` document.
pub struct TemplateService {
    ctx: Arc<ServiceContext>,
}

impl TemplateService {
    /// Create template service instance
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// All templates, ordered by friendly id
    pub async fn list(&self) -> Vec<RuleTemplate> {
        let mut templates = self.ctx.cache.load_templates().await.templates;
        templates.sort_by(|a, b| a.friendly_id.cmp(&b.friendly_id));
        templates
    }

    /// Look up by internal id or friendly id
    pub async fn get(&self, id: &str) -> CoreResult<RuleTemplate> {
        self.ctx
            .cache
            .load_templates()
            .await
            .templates
            .into_iter()
            .find(|t| t.matches_id(id))
            .ok_or_else(|| CoreError::TemplateNotFound(id.to_string()))
    }

    pub async fn create(&self, request: CreateTemplateRequest) -> CoreResult<RuleTemplate> {
        let name = require_field("name", &request.name)?;
        let expression = require_field("expression", &request.expression)?;
        let action = validate_action(&request.action)?;

        let _guard = self.ctx.cache.lock_templates().await;
        let mut cache = self.ctx.cache.load_templates().await;
        let friendly_id = match request.friendly_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => validate_friendly_id(id)?,
            _ => next_friendly_id(&cache),
        };
        if cache
            .templates
            .iter()
            .any(|t| t.friendly_id.eq_ignore_ascii_case(&friendly_id))
        {
            return Err(CoreError::DuplicateTemplate(friendly_id));
        }

        let now = Utc::now();
        let template = RuleTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            friendly_id,
            name,
            description: request.description.trim().to_string(),
            expression,
            action,
            version: INITIAL_TEMPLATE_VERSION.to_string(),
            enabled: request.enabled.unwrap_or(true),
            tags: request.tags,
            created_at: now,
            updated_at: now,
        };

        cache.templates.push(template.clone());
        cache.last_updated = Some(now);
        self.ctx.cache.save_templates(&cache).await?;

        log::info!(
            "[templates] Created template {} ({})",
            template.friendly_id,
            template.name
        );
        Ok(template)
    }

    /// Edit a template. Content changes bump the version.
    pub async fn update(
        &self,
        id: &str,
        request: UpdateTemplateRequest,
    ) -> CoreResult<RuleTemplate> {
        let _guard = self.ctx.cache.lock_templates().await;
        let mut cache = self.ctx.cache.load_templates().await;
        let template = cache
            .templates
            .iter_mut()
            .find(|t| t.matches_id(id))
            .ok_or_else(|| CoreError::TemplateNotFound(id.to_string()))?;

        let bump = request.changes_content(template);
        if let Some(name) = &request.name {
            template.name = require_field("name", name)?;
        }
        if let Some(description) = &request.description {
            template.description = description.trim().to_string();
        }
        if let Some(expression) = &request.expression {
            template.expression = require_field("expression", expression)?;
        }
        if let Some(action) = &request.action {
            template.action = validate_action(action)?;
        }
        if let Some(enabled) = request.enabled {
            template.enabled = enabled;
        }
        if let Some(tags) = request.tags {
            template.tags = tags;
        }
        if bump {
            let previous = std::mem::take(&mut template.version);
            template.version = bump_version(&previous);
            log::info!(
                "[templates] {} content changed, version {previous} -> {}",
                template.friendly_id,
                template.version
            );
        }

        let now = Utc::now();
        template.updated_at = now;
        let updated = template.clone();
        cache.last_updated = Some(now);
        self.ctx.cache.save_templates(&cache).await?;
        Ok(updated)
    }

    /// Flip `enabled` without touching the version
    pub async fn toggle(&self, id: &str) -> CoreResult<RuleTemplate> {
        let current = self.get(id).await?;
        self.update(
            id,
            UpdateTemplateRequest {
                enabled: Some(!current.enabled),
                ..UpdateTemplateRequest::default()
            },
        )
        .await
    }

    pub async fn delete(&self, id: &str) -> CoreResult<()> {
        let _guard = self.ctx.cache.lock_templates().await;
        let mut cache = self.ctx.cache.load_templates().await;
        let before = cache.templates.len();
        cache.templates.retain(|t| !t.matches_id(id));
        if cache.templates.len() == before {
            return Err(CoreError::TemplateNotFound(id.to_string()));
        }
        cache.last_updated = Some(Utc::now());
        self.ctx.cache.save_templates(&cache).await?;
        log::info!("[templates] Deleted template {id}");
        Ok(())
    }

    /// Templates named by `ids`, in request order. Unknown ids are dropped.
    pub async fn resolve_selection(&self, ids: &[String]) -> Vec<RuleTemplate> {
        let templates = self.ctx.cache.load_templates().await.templates;
        let mut selected: Vec<RuleTemplate> = Vec::with_capacity(ids.len());
        for id in ids {
            match templates.iter().find(|t| t.matches_id(id)) {
                Some(t) if !selected.iter().any(|s| s.id == t.id) => selected.push(t.clone()),
                Some(_) => {}
                None => log::debug!("[templates] Selected template {id} is unknown, skipping"),
            }
        }
        selected
    }

    pub async fn version_map(&self) -> TemplateVersionMap {
        let cache = self.ctx.cache.load_templates().await;
        TemplateVersionMap::from_templates(&cache.templates)
    }
}

fn require_field(field: &str, value: &str) -> CoreResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::ValidationError(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}

fn validate_action(action: &str) -> CoreResult<String> {
    let action = action.trim();
    if TEMPLATE_ACTIONS.contains(&action) {
        Ok(action.to_string())
    } else {
        Err(CoreError::ValidationError(format!(
            "Unsupported rule action: {action}"
        )))
    }
}

/// Friendly ids end up inside rule refs, keep them to `[A-Za-z0-9_-]`.
fn validate_friendly_id(id: &str) -> CoreResult<String> {
    if id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(id.to_string())
    } else {
        Err(CoreError::ValidationError(format!(
            "friendlyId may only contain letters, digits, '_' and '-': {id}"
        )))
    }
}

/// `R{n}` one past the highest numeric `R` id in use.
fn next_friendly_id(cache: &TemplateCache) -> String {
    let next = cache
        .templates
        .iter()
        .filter_map(|t| t.friendly_id.strip_prefix('R')?.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    format!("R{next:02}")
}
