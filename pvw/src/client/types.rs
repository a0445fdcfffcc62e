//! Atlas v2 wire types used by the Purview client

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Minimal view of an Atlas entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityHeader {
    pub guid: String,

    #[serde(default)]
    pub type_name: String,

    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Response body of `GET /entity/guid/{guid}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EntityWithExtInfo {
    pub entity: EntityHeader,
}

/// Response body of entity create/update calls
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMutationResponse {
    /// Mutated entities keyed by operation (CREATE, UPDATE, PARTIAL_UPDATE, DELETE)
    #[serde(default)]
    pub mutated_entities: HashMap<String, Vec<EntityHeader>>,

    /// Placeholder guid -> assigned guid
    #[serde(default)]
    pub guid_assignments: HashMap<String, String>,
}

impl EntityMutationResponse {
    /// Mutation response describing a single entity change
    pub fn single(operation: &str, entity: EntityHeader) -> Self {
        let mut mutated_entities = HashMap::new();
        mutated_entities.insert(operation.to_string(), vec![entity]);
        Self {
            mutated_entities,
            guid_assignments: HashMap::new(),
        }
    }

    /// First guid touched by the mutation, preferring creates over updates
    pub fn primary_guid(&self) -> Option<&str> {
        ["CREATE", "UPDATE", "PARTIAL_UPDATE"]
            .iter()
            .filter_map(|op| self.mutated_entities.get(*op))
            .flat_map(|entities| entities.iter())
            .map(|e| e.guid.as_str())
            .next()
            .or_else(|| self.guid_assignments.values().next().map(String::as_str))
    }
}
