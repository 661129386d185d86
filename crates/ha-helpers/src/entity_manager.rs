//! Entity manager
//!
//! Turns [`Entity`] objects into states: picks the entity ID, hands the
//! restored state over, writes the state after every coordinator
//! notification, and routes the platform action services to the entity.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use ha_core::{Context, EntityId, Platform, ServiceCall, STATE_UNAVAILABLE, STATE_UNKNOWN};
use ha_service_registry::{ServiceDescription, ServiceError, ServiceRegistry};
use ha_state_store::{RestoreStateStore, StateStore};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::entity::{Entity, EntityAction, EntityError};

struct RegisteredEntity {
    entity: Arc<dyn Entity>,
    entry_id: String,
    listeners: Vec<JoinHandle<()>>,
}

pub struct EntityManager {
    states: Arc<StateStore>,
    restore: Arc<RestoreStateStore>,
    /// entity_id -> entity
    entities: DashMap<String, RegisteredEntity>,
    /// unique_id -> entity_id
    unique_ids: DashMap<String, String>,
}

impl EntityManager {
    pub fn new(states: Arc<StateStore>, restore: Arc<RestoreStateStore>) -> Self {
        Self {
            states,
            restore,
            entities: DashMap::new(),
            unique_ids: DashMap::new(),
        }
    }

    /// Add entities for a config entry, returning the generated entity IDs
    ///
    /// An entity whose unique ID is already registered is skipped.
    #[instrument(skip(self, entities), fields(count = entities.len()))]
    pub async fn add_entities(
        &self,
        entry_id: &str,
        entities: Vec<Arc<dyn Entity>>,
    ) -> Result<Vec<EntityId>, EntityError> {
        let mut added = Vec::with_capacity(entities.len());

        for entity in entities {
            let info = entity.info().clone();
            if self.unique_ids.contains_key(&info.unique_id) {
                warn!(
                    "Platform {} does not generate unique IDs. ID {} already exists, ignoring",
                    info.platform, info.unique_id
                );
                continue;
            }

            let entity_id = self.generate_entity_id(info.platform, &info.name)?;
            let key = entity_id.to_string();

            let last_state = if info.restore_state {
                self.restore.last_state(&key)
            } else {
                None
            };
            entity.async_added_to_hass(last_state).await;

            write_state(&self.states, &entity_id, entity.as_ref());

            let listeners = entity
                .update_signals()
                .into_iter()
                .map(|mut rx| {
                    let states = Arc::clone(&self.states);
                    let entity = Arc::clone(&entity);
                    let entity_id = entity_id.clone();
                    tokio::spawn(async move {
                        while rx.changed().await.is_ok() {
                            write_state(&states, &entity_id, entity.as_ref());
                        }
                    })
                })
                .collect();

            self.unique_ids.insert(info.unique_id.clone(), key.clone());
            self.entities.insert(
                key,
                RegisteredEntity {
                    entity,
                    entry_id: entry_id.to_string(),
                    listeners,
                },
            );
            debug!(entity_id = %entity_id, unique_id = %info.unique_id, "Added entity");
            added.push(entity_id);
        }

        Ok(added)
    }

    /// `<platform>.<slug(name)>`, with `_2`, `_3`, ... on collision
    fn generate_entity_id(&self, platform: Platform, name: &str) -> Result<EntityId, EntityError> {
        let base = EntityId::from_name(platform.as_str(), name).map_err(|e| {
            EntityError::InvalidName {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;

        let taken = |id: &EntityId| {
            let key = id.to_string();
            self.entities.contains_key(&key) || self.states.contains(&key)
        };

        if !taken(&base) {
            return Ok(base);
        }
        let mut n = 2;
        loop {
            let candidate = base.with_suffix(n);
            if !taken(&candidate) {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Rewrite the state of one entity
    pub fn async_write_ha_state(&self, entity_id: &str) -> Result<(), EntityError> {
        let entity = self.entity(entity_id)?;
        let id: EntityId = entity_id
            .parse()
            .map_err(|_| EntityError::NotFound(entity_id.to_string()))?;
        write_state(&self.states, &id, entity.as_ref());
        Ok(())
    }

    pub fn entity(&self, entity_id: &str) -> Result<Arc<dyn Entity>, EntityError> {
        self.entities
            .get(entity_id)
            .map(|r| Arc::clone(&r.entity))
            .ok_or_else(|| EntityError::NotFound(entity_id.to_string()))
    }

    pub fn entity_id_for_unique_id(&self, unique_id: &str) -> Option<String> {
        self.unique_ids.get(unique_id).map(|r| r.value().clone())
    }

    /// Entity IDs belonging to a config entry
    pub fn entity_ids_for_entry(&self, entry_id: &str) -> Vec<String> {
        self.entities
            .iter()
            .filter(|r| r.entry_id == entry_id)
            .map(|r| r.key().clone())
            .collect()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Run an action on an entity and write its new state
    #[instrument(skip(self))]
    pub async fn handle_action(
        &self,
        entity_id: &str,
        action: EntityAction,
    ) -> Result<(), EntityError> {
        let entity = self.entity(entity_id)?;
        entity.async_handle_action(action).await?;
        self.async_write_ha_state(entity_id)
    }

    /// Remove every entity of a config entry
    ///
    /// States of restorable entities are persisted before removal.
    pub async fn remove_entities(&self, entry_id: &str) -> usize {
        let entity_ids = self.entity_ids_for_entry(entry_id);

        let restorable: Vec<String> = entity_ids
            .iter()
            .filter(|id| {
                self.entities
                    .get(id.as_str())
                    .map(|r| r.entity.info().restore_state)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        if !restorable.is_empty() {
            if let Err(e) = self.restore.dump(&self.states, &restorable).await {
                warn!("Failed to persist restore state: {}", e);
            }
        }

        for entity_id in &entity_ids {
            if let Some((_, registered)) = self.entities.remove(entity_id) {
                for listener in registered.listeners {
                    listener.abort();
                }
                self.unique_ids.remove(&registered.entity.info().unique_id);
            }
            if let Ok(id) = entity_id.parse::<EntityId>() {
                self.states.remove(&id, Context::new());
            }
        }

        info!("Removed {} entities for entry {}", entity_ids.len(), entry_id);
        entity_ids.len()
    }

    /// Register `button.press`, `switch.turn_on`, `switch.turn_off` and
    /// `select.select_option`
    pub fn register_platform_services(
        self: &Arc<Self>,
        services: &ServiceRegistry,
    ) -> Result<(), ServiceError> {
        let target_schema = json!({
            "type": "object",
            "required": ["entity_id"],
            "properties": {
                "entity_id": {
                    "anyOf": [
                        {"type": "string"},
                        {"type": "array", "items": {"type": "string"}}
                    ]
                }
            }
        });

        for (platform, service) in [
            (Platform::Button, "press"),
            (Platform::Switch, "turn_on"),
            (Platform::Switch, "turn_off"),
        ] {
            let manager = Arc::clone(self);
            services.register_with_description(
                ServiceDescription::new(platform.as_str(), service)
                    .with_schema(target_schema.clone()),
                move |call: ServiceCall| {
                    let manager = Arc::clone(&manager);
                    async move {
                        let action = match call.service.as_str() {
                            "press" => EntityAction::Press,
                            "turn_on" => EntityAction::TurnOn,
                            _ => EntityAction::TurnOff,
                        };
                        manager.dispatch(&call, action).await
                    }
                },
            )?;
        }

        let mut select_schema = target_schema;
        select_schema["required"] = json!(["entity_id", "option"]);
        select_schema["properties"]["option"] = json!({"type": "string"});

        let manager = Arc::clone(self);
        services.register_with_description(
            ServiceDescription::new(Platform::Select.as_str(), "select_option")
                .with_schema(select_schema),
            move |call: ServiceCall| {
                let manager = Arc::clone(&manager);
                async move {
                    let option: String = call
                        .get("option")
                        .ok_or_else(|| ServiceError::InvalidData("option is required".into()))?;
                    manager
                        .dispatch(&call, EntityAction::SelectOption(option))
                        .await
                }
            },
        )?;

        debug!("Registered entity platform services");
        Ok(())
    }

    async fn dispatch(
        &self,
        call: &ServiceCall,
        action: EntityAction,
    ) -> Result<Option<serde_json::Value>, ServiceError> {
        for entity_id in call.entity_ids() {
            if !entity_id.starts_with(&format!("{}.", call.domain)) {
                return Err(ServiceError::InvalidData(format!(
                    "{} is not a {} entity",
                    entity_id, call.domain
                )));
            }
            self.handle_action(&entity_id, action.clone())
                .await
                .map_err(|e| ServiceError::CallFailed(e.to_string()))?;
        }
        Ok(None)
    }
}

/// Compose the full state of an entity and store it
fn write_state(states: &StateStore, entity_id: &EntityId, entity: &dyn Entity) {
    let info = entity.info();

    let state = if !entity.available() {
        STATE_UNAVAILABLE.to_string()
    } else {
        entity.state().unwrap_or_else(|| STATE_UNKNOWN.to_string())
    };

    let mut attributes: HashMap<String, serde_json::Value> = entity.capability_attributes();
    if entity.available() {
        attributes.extend(entity.extra_state_attributes());
    }
    attributes.insert("friendly_name".to_string(), json!(info.name));
    if let Some(icon) = &info.icon {
        attributes.insert("icon".to_string(), json!(icon));
    }
    if let Some(unit) = &info.unit_of_measurement {
        attributes.insert("unit_of_measurement".to_string(), json!(unit));
    }
    if let Some(state_class) = info.state_class {
        attributes.insert("state_class".to_string(), json!(state_class.as_str()));
    }

    states.set(entity_id.clone(), state, attributes, Context::new());
}
