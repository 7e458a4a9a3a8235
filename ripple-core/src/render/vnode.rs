//! Render descriptions.
//!
//! A [`VNode`] describes one desired host node: its type, properties,
//! children and optional stable key. The renderer diffs a new description
//! against the previous one and records the host node it ends up attached to
//! in the new description.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::component::{Component, ComponentInstance};
use crate::reactive::Value;

/// Ordered element or component properties.
pub type Props = IndexMap<Rc<str>, Value>;

bitflags::bitflags! {
    /// Shape classification of a description and of its children.
    ///
    /// Combine with bitwise OR: `ShapeFlags::ELEMENT | ShapeFlags::TEXT_CHILDREN`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ShapeFlags: u16 {
        const ELEMENT = 1 << 0;
        const FUNCTIONAL_COMPONENT = 1 << 1;
        const STATEFUL_COMPONENT = 1 << 2;
        const TEXT_CHILDREN = 1 << 3;
        const ARRAY_CHILDREN = 1 << 4;
        const COMPONENT = Self::FUNCTIONAL_COMPONENT.bits() | Self::STATEFUL_COMPONENT.bits();
    }
}

/// Stable identity of a description among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
}

impl Key {
    /// Key from a property value. Only strings and integers qualify.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Str(s) => Some(Key::Str(s.clone())),
            Value::Int(i) => Some(Key::Int(*i)),
            _ => None,
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Int(value as i64)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(i) => write!(f, "{i}"),
        }
    }
}

/// What a description renders to.
pub enum VNodeType<N> {
    Element(Rc<str>),
    Text,
    /// A sibling range with no host node of its own.
    Fragment,
    Component(Rc<Component<N>>),
}

impl<N> VNodeType<N> {
    pub fn tag(&self) -> Option<&str> {
        match self {
            VNodeType::Element(tag) => Some(tag),
            _ => None,
        }
    }
}

impl<N> Clone for VNodeType<N> {
    fn clone(&self) -> Self {
        match self {
            VNodeType::Element(tag) => VNodeType::Element(tag.clone()),
            VNodeType::Text => VNodeType::Text,
            VNodeType::Fragment => VNodeType::Fragment,
            VNodeType::Component(def) => VNodeType::Component(def.clone()),
        }
    }
}

impl<N> PartialEq for VNodeType<N> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Text, VNodeType::Text) => true,
            (VNodeType::Fragment, VNodeType::Fragment) => true,
            (VNodeType::Component(a), VNodeType::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<N> fmt::Debug for VNodeType<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "Element({tag})"),
            VNodeType::Text => f.write_str("Text"),
            VNodeType::Fragment => f.write_str("Fragment"),
            VNodeType::Component(def) => write!(f, "Component({})", def.name()),
        }
    }
}

/// Children of a description.
pub enum Children<N> {
    None,
    Text(Rc<str>),
    Nodes(Vec<VNode<N>>),
}

impl<N> Default for Children<N> {
    fn default() -> Self {
        Children::None
    }
}

impl<N: Clone> Clone for Children<N> {
    fn clone(&self) -> Self {
        match self {
            Children::None => Children::None,
            Children::Text(text) => Children::Text(text.clone()),
            Children::Nodes(nodes) => Children::Nodes(nodes.clone()),
        }
    }
}

impl<N: fmt::Debug> fmt::Debug for Children<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Children::None => f.write_str("None"),
            Children::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Children::Nodes(nodes) => f.debug_list().entries(nodes).finish(),
        }
    }
}

/// A render description.
pub struct VNode<N> {
    pub(crate) ty: VNodeType<N>,
    pub(crate) props: Props,
    pub(crate) children: Children<N>,
    pub(crate) key: Option<Key>,
    pub(crate) shape: ShapeFlags,

    /// Host node once mounted. For a fragment, its start anchor.
    pub(crate) el: Option<N>,

    /// End anchor of a mounted fragment.
    pub(crate) anchor: Option<N>,

    pub(crate) component: Option<Rc<ComponentInstance<N>>>,
}

impl<N> VNode<N> {
    fn new(ty: VNodeType<N>, shape: ShapeFlags) -> Self {
        Self {
            ty,
            props: Props::new(),
            children: Children::None,
            key: None,
            shape,
            el: None,
            anchor: None,
            component: None,
        }
    }

    /// An element with tag `tag`.
    pub fn element(tag: &str) -> Self {
        Self::new(VNodeType::Element(Rc::from(tag)), ShapeFlags::ELEMENT)
    }

    /// A text node.
    pub fn text(content: impl Into<Rc<str>>) -> Self {
        let mut node = Self::new(VNodeType::Text, ShapeFlags::empty());
        node.children = Children::Text(content.into());
        node
    }

    /// A fragment of `children`.
    pub fn fragment(children: impl IntoIterator<Item = VNode<N>>) -> Self {
        Self::new(VNodeType::Fragment, ShapeFlags::empty()).children(children)
    }

    /// An instance of component `def`.
    pub fn component(def: &Rc<Component<N>>) -> Self {
        Self::new(
            VNodeType::Component(def.clone()),
            ShapeFlags::STATEFUL_COMPONENT,
        )
    }

    /// Set a property. A `key` property becomes the description's key.
    pub fn prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if name == "key" {
            self.key = Key::from_value(&value);
            return self;
        }
        self.props.insert(Rc::from(name), value);
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Replace the children with text. A fragment has no element to hold
    /// text, so it gets a single text node instead.
    pub fn text_child(mut self, content: impl Into<Rc<str>>) -> Self {
        if self.is_fragment() {
            self.children = Children::None;
            return self.child(VNode::text(content));
        }
        self.children = Children::Text(content.into());
        self.shape.remove(ShapeFlags::ARRAY_CHILDREN);
        self.shape.insert(ShapeFlags::TEXT_CHILDREN);
        self
    }

    /// Append one child.
    pub fn child(self, child: VNode<N>) -> Self {
        self.children(std::iter::once(child))
    }

    /// Append children.
    pub fn children(mut self, children: impl IntoIterator<Item = VNode<N>>) -> Self {
        match &mut self.children {
            Children::Nodes(nodes) => nodes.extend(children),
            other => *other = Children::Nodes(children.into_iter().collect()),
        }
        if !self.is_text() {
            self.shape.remove(ShapeFlags::TEXT_CHILDREN);
            self.shape.insert(ShapeFlags::ARRAY_CHILDREN);
        }
        self
    }

    pub fn ty(&self) -> &VNodeType<N> {
        &self.ty
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children_ref(&self) -> &Children<N> {
        &self.children
    }

    pub fn key_ref(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn shape(&self) -> ShapeFlags {
        self.shape
    }

    /// Host node this description is attached to, once mounted.
    pub fn el(&self) -> Option<&N> {
        self.el.as_ref()
    }

    pub fn is_text(&self) -> bool {
        matches!(self.ty, VNodeType::Text)
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.ty, VNodeType::Fragment)
    }

    pub fn is_component(&self) -> bool {
        self.shape.intersects(ShapeFlags::COMPONENT)
    }

    /// Same type and same key: patch in place instead of replacing.
    pub fn is_same(&self, other: &VNode<N>) -> bool {
        is_same_vnode(self, other)
    }

    pub(crate) fn text_content(&self) -> &str {
        match &self.children {
            Children::Text(text) => text,
            _ => "",
        }
    }

    pub(crate) fn child_nodes_mut(&mut self) -> &mut [VNode<N>] {
        match &mut self.children {
            Children::Nodes(nodes) => nodes,
            _ => &mut [],
        }
    }
}

/// Whether two descriptions denote the same node: type and key are equal.
pub fn is_same_vnode<N>(a: &VNode<N>, b: &VNode<N>) -> bool {
    a.ty == b.ty && a.key == b.key
}

impl<N: Clone> Clone for VNode<N> {
    fn clone(&self) -> Self {
        Self {
            ty: self.ty.clone(),
            props: self.props.clone(),
            children: self.children.clone(),
            key: self.key.clone(),
            shape: self.shape,
            el: self.el.clone(),
            anchor: self.anchor.clone(),
            component: self.component.clone(),
        }
    }
}

impl<N: fmt::Debug> fmt::Debug for VNode<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("type", &self.ty);
        if let Some(key) = &self.key {
            s.field("key", key);
        }
        if !self.props.is_empty() {
            s.field("props", &self.props);
        }
        s.field("children", &self.children);
        if let Some(el) = &self.el {
            s.field("el", el);
        }
        s.finish()
    }
}
