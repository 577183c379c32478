//! Category Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::domain::value_objects::{Slug, SlugError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub image_url: Option<String>,
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool { true }

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct CategoryPatch {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub parent_id: Option<Uuid>,
    /// Turns the category into a root category.
    #[serde(default)]
    pub detach_parent: bool,
    pub is_active: Option<bool>,
}

impl Category {
    pub fn create(new: NewCategory) -> Result<Self, CategoryError> {
        new.validate()?;
        let slug = match new.slug {
            Some(slug) => Slug::new(slug)?,
            None => Slug::from_name(&new.name)?,
        };
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), name: new.name, slug, description: new.description, image_url: new.image_url,
            parent_id: new.parent_id, is_active: new.is_active, created_at: now, updated_at: now,
        })
    }

    /// Applies a partial update. `all` is the full category set, used to
    /// reject a parent that would make the hierarchy cyclic.
    pub fn apply(&mut self, patch: CategoryPatch, all: &[Category]) -> Result<(), CategoryError> {
        patch.validate()?;
        let mut next = self.clone();
        if let Some(name) = patch.name { next.name = name; }
        if let Some(slug) = patch.slug { next.slug = Slug::new(slug)?; }
        if let Some(description) = patch.description { next.description = description; }
        if let Some(url) = patch.image_url { next.image_url = Some(url); }
        if let Some(active) = patch.is_active { next.is_active = active; }
        if patch.detach_parent { next.parent_id = None; }
        if let Some(parent_id) = patch.parent_id {
            if parent_id == self.id { return Err(CategoryError::SelfParent); }
            if !all.iter().any(|c| c.id == parent_id) { return Err(CategoryError::UnknownParent(parent_id)); }
            if is_descendant(parent_id, self.id, all) { return Err(CategoryError::Cycle); }
            next.parent_id = Some(parent_id);
        }
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }
}

/// True when `candidate` sits somewhere below `ancestor`.
fn is_descendant(candidate: Uuid, ancestor: Uuid, all: &[Category]) -> bool {
    let mut seen = HashSet::new();
    let mut current = all.iter().find(|c| c.id == candidate).and_then(|c| c.parent_id);
    while let Some(id) = current {
        if id == ancestor { return true; }
        if !seen.insert(id) { return false; }
        current = all.iter().find(|c| c.id == id).and_then(|c| c.parent_id);
    }
    false
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub image_url: Option<String>,
}

impl From<&Category> for CategorySummary {
    fn from(c: &Category) -> Self {
        Self { id: c.id, name: c.name.clone(), slug: c.slug.clone(), image_url: c.image_url.clone() }
    }
}

/// A category with its active descendants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryTree {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryTree>,
}

impl CategoryTree {
    pub fn build(root: Category, all: &[Category]) -> Self {
        let mut visited = HashSet::from([root.id]);
        Self::grow(root, all, &mut visited)
    }

    fn grow(category: Category, all: &[Category], visited: &mut HashSet<Uuid>) -> Self {
        let mut children: Vec<&Category> = all
            .iter()
            .filter(|c| c.parent_id == Some(category.id) && c.is_active)
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        let mut nodes = Vec::with_capacity(children.len());
        for child in children {
            if visited.insert(child.id) {
                nodes.push(Self::grow(child.clone(), all, visited));
            }
        }
        Self { category, children: nodes }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CategoryError {
    #[error("{0}")]
    Invalid(#[from] ValidationErrors),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("A category cannot be its own parent")]
    SelfParent,
    #[error("Parent category {0} does not exist")]
    UnknownParent(Uuid),
    #[error("Parent category would create a cycle")]
    Cycle,
}
