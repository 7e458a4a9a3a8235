//! Host capability set.
//!
//! The renderer knows nothing about the tree it drives. Everything it does to
//! host nodes goes through [`HostOps`]. Every capability has a default that
//! fails with [`Error::MissingCapability`], so a host that leaves one out
//! fails when the renderer first needs it rather than up front.

use std::fmt::Debug;

use crate::error::{Error, Result};
use crate::reactive::Value;

/// Operations a rendering backend provides.
pub trait HostOps {
    /// Handle to a host node. Cloning yields the same node.
    type Node: Clone + PartialEq + Debug + 'static;

    fn create_element(&mut self, _tag: &str) -> Result<Self::Node> {
        Err(Error::MissingCapability("create_element"))
    }

    fn create_text(&mut self, _text: &str) -> Result<Self::Node> {
        Err(Error::MissingCapability("create_text"))
    }

    /// Replace the content of a text node.
    fn set_text(&mut self, _node: &Self::Node, _text: &str) -> Result<()> {
        Err(Error::MissingCapability("set_text"))
    }

    /// Replace all children of an element with text.
    fn set_element_text(&mut self, _el: &Self::Node, _text: &str) -> Result<()> {
        Err(Error::MissingCapability("set_element_text"))
    }

    /// Insert `node` into `parent` before `anchor`, or at the end.
    ///
    /// Inserting a node that is already attached moves it.
    fn insert(
        &mut self,
        _node: &Self::Node,
        _parent: &Self::Node,
        _anchor: Option<&Self::Node>,
    ) -> Result<()> {
        Err(Error::MissingCapability("insert"))
    }

    /// Detach `node` from its parent.
    fn remove(&mut self, _node: &Self::Node) -> Result<()> {
        Err(Error::MissingCapability("remove"))
    }

    fn parent_node(&self, _node: &Self::Node) -> Result<Option<Self::Node>> {
        Err(Error::MissingCapability("parent_node"))
    }

    fn next_sibling(&self, _node: &Self::Node) -> Result<Option<Self::Node>> {
        Err(Error::MissingCapability("next_sibling"))
    }

    /// Apply one property change. `next` is `None` when the property is gone.
    fn patch_prop(
        &mut self,
        _el: &Self::Node,
        _key: &str,
        _prev: Option<&Value>,
        _next: Option<&Value>,
    ) -> Result<()> {
        Err(Error::MissingCapability("patch_prop"))
    }
}
