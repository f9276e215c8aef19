//! Node registry: configuration validation, uniqueness, numbering.

use std::collections::BTreeMap;

use shared_types::{AdminState, EpochIndex, MlNode, MlNodeConfig, NodeState};

use crate::error::{BrokerError, Result};

/// One registered node with its lifecycle state.
#[derive(Debug, Clone)]
pub struct RegisteredNode {
    /// Registered node (config + number + admin).
    pub node: MlNode,
    /// Lifecycle state, broker-owned.
    pub state: NodeState,
}

/// The fleet registry. Keys are node ids; iteration order is
/// lexicographic, which the lock selection tie-break relies on.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, RegisteredNode>,
    max_nodes: usize,
}

impl NodeRegistry {
    /// Registry bounded to `max_nodes` entries.
    pub fn new(max_nodes: usize) -> Self {
        Self {
            nodes: BTreeMap::new(),
            max_nodes,
        }
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Validate the intrinsic rules of one configuration, returning the
    /// normalized (id-trimmed) config.
    fn validate(config: &MlNodeConfig) -> Result<MlNodeConfig> {
        let mut config = config.clone();
        config.id = config.id.trim().to_string();

        if config.id.is_empty() {
            return Err(BrokerError::InvalidConfig("empty node id".to_string()));
        }
        if config.host.trim().is_empty() {
            return Err(BrokerError::InvalidConfig("empty host".to_string()));
        }
        if config.inference_port == 0 {
            return Err(BrokerError::InvalidConfig(
                "inference_port out of range".to_string(),
            ));
        }
        if config.poc_port == 0 {
            return Err(BrokerError::InvalidConfig("poc_port out of range".to_string()));
        }
        if config.max_concurrent == 0 {
            return Err(BrokerError::InvalidConfig(
                "max_concurrent must be positive".to_string(),
            ));
        }
        if config.models.is_empty() {
            return Err(BrokerError::InvalidConfig(
                "at least one model required".to_string(),
            ));
        }
        Ok(config)
    }

    /// Check fleet-wide uniqueness of `(id, endpoints)`, excluding
    /// `exclude_id` (self, on update). A port swap within one node is
    /// legal because the exclusion removes the node's own endpoints from
    /// the comparison set.
    fn check_uniqueness(&self, config: &MlNodeConfig, exclude_id: Option<&str>) -> Result<()> {
        for (id, existing) in &self.nodes {
            if Some(id.as_str()) == exclude_id {
                continue;
            }
            let other = &existing.node.config;
            if *id == config.id {
                return Err(BrokerError::Duplicate {
                    what: "id".to_string(),
                    other_id: id.clone(),
                });
            }
            if other.host == config.host && other.inference_port == config.inference_port {
                return Err(BrokerError::Duplicate {
                    what: "inference endpoint".to_string(),
                    other_id: id.clone(),
                });
            }
            if other.host == config.host && other.poc_port == config.poc_port {
                return Err(BrokerError::Duplicate {
                    what: "poc endpoint".to_string(),
                    other_id: id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Register a new node. Assigns `node_num = max existing + 1`, enables
    /// it effective the current epoch, and initializes UNKNOWN/IDLE state.
    pub fn register(&mut self, config: &MlNodeConfig, current_epoch: EpochIndex) -> Result<MlNode> {
        let config = Self::validate(config)?;
        if self.nodes.len() >= self.max_nodes {
            return Err(BrokerError::LimitReached(self.max_nodes));
        }
        self.check_uniqueness(&config, None)?;

        let node_num = self
            .nodes
            .values()
            .map(|n| n.node.node_num)
            .max()
            .unwrap_or(0)
            + 1;

        let node = MlNode {
            config: config.clone(),
            node_num,
            admin: AdminState {
                enabled: true,
                effective_epoch: current_epoch,
            },
        };
        self.nodes.insert(
            config.id.clone(),
            RegisteredNode {
                node: node.clone(),
                state: NodeState::default(),
            },
        );
        Ok(node)
    }

    /// Update a node's configuration in place. `node_num`, admin state,
    /// and lifecycle state are preserved.
    pub fn update(&mut self, config: &MlNodeConfig) -> Result<MlNode> {
        let config = Self::validate(config)?;
        if !self.nodes.contains_key(&config.id) {
            return Err(BrokerError::UnknownNode(config.id.clone()));
        }
        self.check_uniqueness(&config, Some(config.id.as_str()))?;

        let entry = self.nodes.get_mut(&config.id).expect("checked above");
        entry.node.config = config;
        Ok(entry.node.clone())
    }

    /// Remove a node, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<RegisteredNode> {
        self.nodes.remove(id)
    }

    /// Borrow one node.
    pub fn get(&self, id: &str) -> Option<&RegisteredNode> {
        self.nodes.get(id)
    }

    /// Mutably borrow one node.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut RegisteredNode> {
        self.nodes.get_mut(id)
    }

    /// Iterate nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &RegisteredNode)> {
        self.nodes.iter()
    }

    /// Mutably iterate nodes in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut RegisteredNode)> {
        self.nodes.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ModelSpec;

    fn config(id: &str, host: &str, inference_port: u16, poc_port: u16) -> MlNodeConfig {
        MlNodeConfig {
            id: id.to_string(),
            host: host.to_string(),
            inference_port,
            poc_port,
            inference_segment: String::new(),
            poc_segment: String::new(),
            max_concurrent: 1,
            models: vec![ModelSpec {
                id: "model1".to_string(),
                args: vec![],
            }],
            hardware: vec![],
        }
    }

    #[test]
    fn test_validation_rules() {
        let mut registry = NodeRegistry::new(8);

        let mut bad = config(" ", "h", 1, 2);
        assert!(matches!(
            registry.register(&bad, 0),
            Err(BrokerError::InvalidConfig(_))
        ));

        bad = config("a", "h", 0, 2);
        assert!(registry.register(&bad, 0).is_err());

        bad = config("a", "h", 1, 2);
        bad.max_concurrent = 0;
        assert!(registry.register(&bad, 0).is_err());

        bad = config("a", "h", 1, 2);
        bad.models.clear();
        assert!(registry.register(&bad, 0).is_err());
    }

    #[test]
    fn test_id_is_trimmed() {
        let mut registry = NodeRegistry::new(8);
        let node = registry.register(&config("  node1  ", "h", 1, 2), 0).unwrap();
        assert_eq!(node.config.id, "node1");
        assert!(registry.get("node1").is_some());
    }

    #[test]
    fn test_node_num_is_monotone_and_preserved() {
        let mut registry = NodeRegistry::new(8);
        let a = registry.register(&config("a", "h", 1, 2), 0).unwrap();
        let b = registry.register(&config("b", "h", 3, 4), 0).unwrap();
        assert_eq!(a.node_num, 1);
        assert_eq!(b.node_num, 2);

        // Removing the max and registering again does not reuse numbers
        // below the current max.
        registry.remove("a");
        let c = registry.register(&config("c", "h", 5, 6), 0).unwrap();
        assert_eq!(c.node_num, 3);

        // Update preserves the number.
        let mut updated = config("b", "h", 30, 4);
        let b2 = registry.update(&updated).unwrap();
        assert_eq!(b2.node_num, 2);

        updated.max_concurrent = 9;
        assert_eq!(registry.update(&updated).unwrap().config.max_concurrent, 9);
    }

    #[test]
    fn test_uniqueness_on_register() {
        let mut registry = NodeRegistry::new(8);
        registry.register(&config("a", "H", 8080, 5000), 0).unwrap();

        assert!(matches!(
            registry.register(&config("a", "X", 1, 2), 0),
            Err(BrokerError::Duplicate { what, .. }) if what == "id"
        ));
        assert!(matches!(
            registry.register(&config("b", "H", 8080, 9), 0),
            Err(BrokerError::Duplicate { what, .. }) if what == "inference endpoint"
        ));
        assert!(matches!(
            registry.register(&config("b", "H", 9, 5000), 0),
            Err(BrokerError::Duplicate { what, .. }) if what == "poc endpoint"
        ));
        // Same ports on a different host are fine.
        registry.register(&config("b", "H2", 8080, 5000), 0).unwrap();
    }

    #[test]
    fn test_update_collision_leaves_node_unchanged() {
        let mut registry = NodeRegistry::new(8);
        registry.register(&config("node1", "H", 8080, 5000), 0).unwrap();
        registry.register(&config("node2", "H", 8081, 5001), 0).unwrap();

        let err = registry.update(&config("node2", "H", 8080, 5000)).unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        let node2 = &registry.get("node2").unwrap().node.config;
        assert_eq!(node2.inference_port, 8081);
        assert_eq!(node2.poc_port, 5001);
    }

    #[test]
    fn test_port_swap_within_one_node_is_allowed() {
        let mut registry = NodeRegistry::new(8);
        registry.register(&config("a", "H", 8080, 5000), 0).unwrap();

        let swapped = registry.update(&config("a", "H", 5000, 8080)).unwrap();
        assert_eq!(swapped.config.inference_port, 5000);
        assert_eq!(swapped.config.poc_port, 8080);
    }

    #[test]
    fn test_limit_reached() {
        let mut registry = NodeRegistry::new(1);
        registry.register(&config("a", "h", 1, 2), 0).unwrap();
        assert!(matches!(
            registry.register(&config("b", "h", 3, 4), 0),
            Err(BrokerError::LimitReached(1))
        ));
    }
}
