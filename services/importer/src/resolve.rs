//! Entity Resolver - find-or-create for institutions and programs
//!
//! Names are normalized (trimmed, inner whitespace collapsed) and matched
//! exactly. Lookup-then-create runs under one lock so concurrent column
//! workers never create the same entity twice; the store's unique name
//! constraint covers other processes.

use crate::error::ResolveError;
use crate::model::{EntityId, EntityKind};
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub id: EntityId,
    /// This call created the entity
    pub created: bool,
}

pub struct EntityResolver {
    store: Arc<dyn Store>,
    known: Mutex<HashMap<(EntityKind, String), EntityId>>,
}

pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl EntityResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            known: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, kind: EntityKind, raw_name: &str) -> Result<Resolved, ResolveError> {
        let name = normalize_name(raw_name);
        if name.is_empty() {
            return Err(ResolveError::EmptyName(kind));
        }

        let mut known = self.known.lock().await;
        if let Some(id) = known.get(&(kind, name.clone())) {
            return Ok(Resolved {
                id: *id,
                created: false,
            });
        }

        let resolved = match self.store.find_entity(kind, &name).await? {
            Some(id) => Resolved { id, created: false },
            None => {
                let id = self.store.insert_entity(kind, &name).await?;
                tracing::debug!(%kind, name = %name, id = %id, "created entity");
                Resolved { id, created: true }
            }
        };
        known.insert((kind, name), resolved.id);
        Ok(resolved)
    }
}
