//! In-memory host.
//!
//! [`MemoryHost`] keeps a small element/text tree and logs every operation
//! the renderer performs on it. It is the headless backend used by the tests
//! and benchmarks, and a reference for writing real hosts.

use std::fmt::{self, Write as _};

use indexmap::IndexMap;
use serde::Serialize;

use super::host::HostOps;
use crate::error::{Error, Result};
use crate::reactive::Value;

/// Handle to a node in a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

/// One logged host operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    CreateElement {
        node: NodeId,
        tag: String,
    },
    CreateText {
        node: NodeId,
        text: String,
    },
    SetText {
        node: NodeId,
        text: String,
    },
    SetElementText {
        node: NodeId,
        text: String,
    },
    /// A detached node was attached.
    Insert {
        node: NodeId,
        parent: NodeId,
        anchor: Option<NodeId>,
    },
    /// An attached node was re-inserted.
    Move {
        node: NodeId,
        parent: NodeId,
        anchor: Option<NodeId>,
    },
    Remove {
        node: NodeId,
    },
    PatchProp {
        node: NodeId,
        key: String,
        value: Option<Value>,
    },
}

#[derive(Debug)]
enum NodeKind {
    Element {
        tag: String,
        props: IndexMap<String, Value>,
    },
    Text(String),
}

#[derive(Debug)]
struct MemoryNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Headless host tree with an operation log.
#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<MemoryNode>,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached container element. Not logged.
    pub fn create_root(&mut self) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: String::from("root"),
            props: IndexMap::new(),
        })
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MemoryNode {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> Result<&MemoryNode> {
        self.nodes.get(id.0).ok_or(Error::Detached)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut MemoryNode> {
        self.nodes.get_mut(id.0).ok_or(Error::Detached)
    }

    fn detach(&mut self, id: NodeId) -> Result<bool> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(false);
        };
        self.node_mut(parent)?.children.retain(|child| *child != id);
        self.node_mut(id)?.parent = None;
        Ok(true)
    }

    /// Every operation performed so far.
    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    /// Drain the operation log.
    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Number of re-insertions of already attached nodes in the log.
    pub fn move_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, HostOp::Move { .. }))
            .count()
    }

    /// Number of node creations in the log.
    pub fn create_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, HostOp::CreateElement { .. } | HostOp::CreateText { .. }))
            .count()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn prop(&self, id: NodeId, key: &str) -> Option<&Value> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element { props, .. } => props.get(key),
            NodeKind::Text(_) => None,
        }
    }

    /// Concatenated text of `id` and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { .. } => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Markup for the children of `id`. Empty text nodes print nothing.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_html(*child, &mut out);
        }
        out
    }

    /// Markup for `id` and its descendants.
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { tag, props } => {
                let _ = write!(out, "<{tag}");
                for (key, value) in props {
                    let _ = write!(out, " {key}=\"{}\"", value.to_display_string());
                }
                out.push('>');
                for child in &node.children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

impl HostOps for MemoryHost {
    type Node = NodeId;

    fn create_element(&mut self, tag: &str) -> Result<NodeId> {
        let node = self.alloc(NodeKind::Element {
            tag: tag.to_owned(),
            props: IndexMap::new(),
        });
        self.ops.push(HostOp::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        Ok(node)
    }

    fn create_text(&mut self, text: &str) -> Result<NodeId> {
        let node = self.alloc(NodeKind::Text(text.to_owned()));
        self.ops.push(HostOp::CreateText {
            node,
            text: text.to_owned(),
        });
        Ok(node)
    }

    fn set_text(&mut self, node: &NodeId, text: &str) -> Result<()> {
        match &mut self.node_mut(*node)?.kind {
            NodeKind::Text(content) => *content = text.to_owned(),
            NodeKind::Element { .. } => return Err(Error::Detached),
        }
        self.ops.push(HostOp::SetText {
            node: *node,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn set_element_text(&mut self, el: &NodeId, text: &str) -> Result<()> {
        let children = std::mem::take(&mut self.node_mut(*el)?.children);
        for child in children {
            self.node_mut(child)?.parent = None;
        }

        if !text.is_empty() {
            let child = self.alloc(NodeKind::Text(text.to_owned()));
            self.node_mut(child)?.parent = Some(*el);
            self.node_mut(*el)?.children.push(child);
        }

        self.ops.push(HostOp::SetElementText {
            node: *el,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn insert(&mut self, node: &NodeId, parent: &NodeId, anchor: Option<&NodeId>) -> Result<()> {
        let moved = self.detach(*node)?;

        let siblings = &self.node(*parent)?.children;
        let index = match anchor {
            Some(anchor) => siblings
                .iter()
                .position(|child| child == anchor)
                .ok_or(Error::Detached)?,
            None => siblings.len(),
        };

        self.node_mut(*parent)?.children.insert(index, *node);
        self.node_mut(*node)?.parent = Some(*parent);

        let (node, parent, anchor) = (*node, *parent, anchor.copied());
        self.ops.push(if moved {
            HostOp::Move {
                node,
                parent,
                anchor,
            }
        } else {
            HostOp::Insert {
                node,
                parent,
                anchor,
            }
        });
        Ok(())
    }

    fn remove(&mut self, node: &NodeId) -> Result<()> {
        self.detach(*node)?;
        self.ops.push(HostOp::Remove { node: *node });
        Ok(())
    }

    fn parent_node(&self, node: &NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(*node)?.parent)
    }

    fn next_sibling(&self, node: &NodeId) -> Result<Option<NodeId>> {
        let Some(parent) = self.node(*node)?.parent else {
            return Ok(None);
        };
        let siblings = &self.node(parent)?.children;
        let next = siblings
            .iter()
            .position(|child| child == node)
            .and_then(|index| siblings.get(index + 1))
            .copied();
        Ok(next)
    }

    fn patch_prop(
        &mut self,
        el: &NodeId,
        key: &str,
        _prev: Option<&Value>,
        next: Option<&Value>,
    ) -> Result<()> {
        match &mut self.node_mut(*el)?.kind {
            NodeKind::Element { props, .. } => match next {
                Some(value) => {
                    props.insert(key.to_owned(), value.clone());
                }
                None => {
                    props.shift_remove(key);
                }
            },
            NodeKind::Text(_) => return Err(Error::Detached),
        }
        self.ops.push(HostOp::PatchProp {
            node: *el,
            key: key.to_owned(),
            value: next.cloned(),
        });
        Ok(())
    }
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("nodes", &self.nodes.len())
            .field("ops", &self.ops.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_appends_and_anchors() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_element("a").unwrap();
        let b = host.create_element("b").unwrap();
        let c = host.create_element("c").unwrap();

        host.insert(&a, &root, None).unwrap();
        host.insert(&c, &root, None).unwrap();
        host.insert(&b, &root, Some(&c)).unwrap();

        assert_eq!(host.children(root), &[a, b, c]);
        assert_eq!(host.next_sibling(&a).unwrap(), Some(b));
        assert_eq!(host.parent_node(&c).unwrap(), Some(root));
        assert_eq!(host.move_count(), 0);
    }

    #[test]
    fn reinserting_is_logged_as_move() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_element("a").unwrap();
        let b = host.create_element("b").unwrap();
        host.insert(&a, &root, None).unwrap();
        host.insert(&b, &root, None).unwrap();

        host.insert(&b, &root, Some(&a)).unwrap();

        assert_eq!(host.children(root), &[b, a]);
        assert_eq!(host.move_count(), 1);
    }

    #[test]
    fn element_text_replaces_children() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let p = host.create_element("p").unwrap();
        let t = host.create_text("old").unwrap();
        host.insert(&p, &root, None).unwrap();
        host.insert(&t, &p, None).unwrap();

        host.set_element_text(&p, "new").unwrap();
        assert_eq!(host.text_content(p), "new");
        assert_eq!(host.parent(t), None);

        host.set_element_text(&p, "").unwrap();
        assert!(host.children(p).is_empty());
    }

    #[test]
    fn html_includes_props() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let div = host.create_element("div").unwrap();
        host.patch_prop(&div, "id", None, Some(&Value::from("main")))
            .unwrap();
        host.set_element_text(&div, "hi").unwrap();
        host.insert(&div, &root, None).unwrap();

        assert_eq!(host.inner_html(root), "<div id=\"main\">hi</div>");

        host.patch_prop(&div, "id", Some(&Value::from("main")), None)
            .unwrap();
        assert_eq!(host.inner_html(root), "<div>hi</div>");
    }

    #[test]
    fn ops_serialize_with_tags() {
        let mut host = MemoryHost::new();
        host.create_text("x").unwrap();
        let json = serde_json::to_value(host.ops()).unwrap();
        assert_eq!(json[0]["op"], "create_text");
        assert_eq!(json[0]["text"], "x");
    }
}
