#![forbid(unsafe_code)]

//! A minimal node tree standing in for the engine-owned DOM.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::reconciler::PortalTarget;

/// Handle to a node in a [`TestDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct NodeData {
    parent: Option<NodeId>,
    content: Option<String>,
    attached: bool,
    mounts: u32,
}

#[derive(Debug, Default)]
struct DomInner {
    next_id: u32,
    nodes: BTreeMap<NodeId, NodeData>,
}

/// Shared node tree. Cloning creates a new handle to the same tree.
#[derive(Debug, Clone, Default)]
pub struct TestDom {
    inner: Rc<RefCell<DomInner>>,
}

impl TestDom {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an attached node.
    pub fn create_node(&self, parent: Option<NodeId>) -> NodeId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = NodeId(inner.next_id);
        inner.nodes.insert(
            id,
            NodeData {
                parent,
                attached: true,
                ..NodeData::default()
            },
        );
        id
    }

    /// Detach a node and everything under it.
    pub fn detach(&self, node: NodeId) {
        let mut inner = self.inner.borrow_mut();
        let mut doomed = vec![node];
        while let Some(current) = doomed.pop() {
            if let Some(data) = inner.nodes.get_mut(&current) {
                data.attached = false;
            }
            doomed.extend(
                inner
                    .nodes
                    .iter()
                    .filter(|(_, d)| d.parent == Some(current) && d.attached)
                    .map(|(id, _)| *id),
            );
        }
    }

    #[must_use]
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .is_some_and(|d| d.attached)
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().nodes.get(&node).and_then(|d| d.parent)
    }

    /// Content currently mounted into `node`.
    #[must_use]
    pub fn content(&self, node: NodeId) -> Option<String> {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .and_then(|d| d.content.clone())
    }

    /// How many times content was mounted or replaced in `node`.
    #[must_use]
    pub fn mount_count(&self, node: NodeId) -> u32 {
        self.inner.borrow().nodes.get(&node).map_or(0, |d| d.mounts)
    }

    /// Attached nodes that currently hold content.
    #[must_use]
    pub fn filled_nodes(&self) -> Vec<(NodeId, String)> {
        self.inner
            .borrow()
            .nodes
            .iter()
            .filter(|(_, d)| d.attached)
            .filter_map(|(id, d)| d.content.clone().map(|c| (*id, c)))
            .collect()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }
}

impl PortalTarget<NodeId, String> for TestDom {
    fn mount(&mut self, container: &NodeId, content: &String) {
        let mut inner = self.inner.borrow_mut();
        if let Some(data) = inner.nodes.get_mut(container) {
            data.content = Some(content.clone());
            data.mounts += 1;
        }
    }

    fn unmount(&mut self, container: &NodeId) {
        if let Some(data) = self.inner.borrow_mut().nodes.get_mut(container) {
            data.content = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_detach_subtree() {
        let dom = TestDom::new();
        let root = dom.create_node(None);
        let child = dom.create_node(Some(root));
        let grandchild = dom.create_node(Some(child));
        assert_eq!(dom.parent(grandchild), Some(child));

        dom.detach(child);
        assert!(dom.is_attached(root));
        assert!(!dom.is_attached(child));
        assert!(!dom.is_attached(grandchild));
    }

    #[test]
    fn mount_and_unmount_content() {
        let mut dom = TestDom::new();
        let node = dom.create_node(None);
        dom.mount(&node, &"hello".to_string());
        assert_eq!(dom.content(node).as_deref(), Some("hello"));
        assert_eq!(dom.filled_nodes(), vec![(node, "hello".to_string())]);

        dom.unmount(&node);
        assert_eq!(dom.content(node), None);
        assert_eq!(dom.mount_count(node), 1);
    }

    #[test]
    fn node_display() {
        let dom = TestDom::new();
        let node = dom.create_node(None);
        assert_eq!(node.to_string(), "#1");
        assert_eq!(node.get(), 1);
    }
}
