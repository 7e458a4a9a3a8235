//! Renderer
//!
//! Turns render descriptions into host mutations.
//!
//! # How It Works
//!
//! `render(tree, container)` patches `tree` against whatever was last rendered
//! into `container`:
//!
//! 1. Descriptions that are not the same node (type or key differ) are
//!    replaced: the old one is unmounted and the new one mounted where it was.
//! 2. Same-node pairs are patched in place. The new description takes over
//!    the old host node, properties are diffed, and children go through the
//!    keyed reconciler.
//! 3. Components render inside their own subscriber. A component re-renders
//!    on the next scheduler flush after something it read changes, or
//!    immediately when its parent passes it different props.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;

use super::component::{Component, ComponentInstance, Lifecycle};
use super::host::HostOps;
use super::vnode::{Children, Props, ShapeFlags, VNode, VNodeType};
use crate::error::{Error, Result};
use crate::reactive::{EffectOptions, Job, RawObject, Runtime, RuntimeInner};

/// Counters accumulated across reconciliations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Descriptions mounted fresh.
    pub mounted: usize,
    /// Same-node pairs patched in place.
    pub patched: usize,
    /// Host nodes physically moved by the keyed reconciler.
    pub moved: usize,
    /// Descriptions unmounted.
    pub unmounted: usize,
    /// Unordered middle windows reconciled.
    pub windows: usize,
    /// Summed LIS length over those windows.
    pub lis_length: usize,
}

pub(crate) struct RendererInner<H: HostOps> {
    runtime: Weak<RuntimeInner>,
    host: RefCell<H>,
    roots: RefCell<Vec<(H::Node, VNode<H::Node>)>>,
    stats: Cell<ReconcileStats>,
}

/// Drives a host tree from render descriptions.
pub struct Renderer<H: HostOps> {
    inner: Rc<RendererInner<H>>,
}

impl<H: HostOps + 'static> Renderer<H> {
    pub fn new(runtime: &Runtime, host: H) -> Self {
        Self {
            inner: Rc::new(RendererInner {
                runtime: runtime.downgrade(),
                host: RefCell::new(host),
                roots: RefCell::new(Vec::new()),
                stats: Cell::new(ReconcileStats::default()),
            }),
        }
    }

    /// Render `vnode` into `container`, patching against the previous tree.
    /// `None` unmounts whatever is there.
    ///
    /// If an error is returned, the container's previous tree is forgotten
    /// and the next call mounts from scratch.
    pub fn render(&self, vnode: Option<VNode<H::Node>>, container: &H::Node) -> Result<()> {
        let inner = &self.inner;
        let rt = inner.runtime()?;

        let previous = {
            let mut roots = inner.roots.borrow_mut();
            roots
                .iter()
                .position(|(root, _)| root == container)
                .map(|index| roots.swap_remove(index).1)
        };

        let before = inner.stats.get();
        match vnode {
            None => {
                if let Some(mut old) = previous {
                    rt.untrack(|| inner.unmount(&mut old, true))?;
                }
            }
            Some(mut new) => {
                let mut previous = previous;
                rt.untrack(|| inner.patch(previous.as_mut(), &mut new, container, None))?;
                inner.roots.borrow_mut().push((container.clone(), new));
            }
        }

        let after = inner.stats.get();
        tracing::debug!(
            ?container,
            mounted = after.mounted - before.mounted,
            patched = after.patched - before.patched,
            moved = after.moved - before.moved,
            unmounted = after.unmounted - before.unmounted,
            "render"
        );
        Ok(())
    }

    /// The host. Do not hold the borrow across `render` or a scheduler flush.
    pub fn host(&self) -> Ref<'_, H> {
        self.inner.host.borrow()
    }

    pub fn host_mut(&self) -> RefMut<'_, H> {
        self.inner.host.borrow_mut()
    }

    /// Counters since the last call.
    pub fn take_stats(&self) -> ReconcileStats {
        self.inner.stats.take()
    }

    /// The tree last rendered into `container`.
    pub fn with_tree<R>(
        &self,
        container: &H::Node,
        f: impl FnOnce(Option<&VNode<H::Node>>) -> R,
    ) -> R {
        let roots = self.inner.roots.borrow();
        f(roots
            .iter()
            .find(|(root, _)| root == container)
            .map(|(_, tree)| tree))
    }
}

impl<H: HostOps> fmt::Debug for Renderer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("roots", &self.inner.roots.borrow().len())
            .field("stats", &self.inner.stats.get())
            .finish()
    }
}

impl<H: HostOps + 'static> RendererInner<H> {
    fn runtime(&self) -> Result<Runtime> {
        Runtime::upgrade(&self.runtime).ok_or(Error::RuntimeDropped)
    }

    pub(super) fn bump(&self, f: impl FnOnce(&mut ReconcileStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    pub(super) fn host(&self) -> RefMut<'_, H> {
        self.host.borrow_mut()
    }

    /// Patch `old` into `new`, or mount `new` when there is nothing to patch.
    pub(super) fn patch(
        self: &Rc<Self>,
        old: Option<&mut VNode<H::Node>>,
        new: &mut VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<()> {
        let mut anchor = anchor.cloned();

        let old = match old {
            Some(old) if !old.is_same(new) => {
                anchor = self.next_host_node(old)?;
                self.unmount(old, true)?;
                None
            }
            other => other,
        };

        let Some(old) = old else {
            return self.mount(new, container, anchor.as_ref());
        };

        match new.ty {
            VNodeType::Text => self.patch_text(old, new),
            VNodeType::Fragment => self.patch_fragment(old, new, container),
            VNodeType::Element(_) => self.patch_element(old, new),
            VNodeType::Component(_) => self.patch_component(old, new),
        }
    }

    fn mount(
        self: &Rc<Self>,
        vnode: &mut VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<()> {
        match &vnode.ty {
            VNodeType::Text => {
                let el = self.host().create_text(vnode.text_content())?;
                self.host().insert(&el, container, anchor)?;
                vnode.el = Some(el);
            }
            VNodeType::Fragment => {
                let start = self.host().create_text("")?;
                let end = self.host().create_text("")?;
                self.host().insert(&start, container, anchor)?;
                self.host().insert(&end, container, anchor)?;
                self.mount_children(vnode.child_nodes_mut(), container, Some(&end))?;
                vnode.el = Some(start);
                vnode.anchor = Some(end);
            }
            VNodeType::Element(tag) => {
                let el = self.host().create_element(tag)?;
                vnode.el = Some(el.clone());

                for (key, value) in &vnode.props {
                    self.host().patch_prop(&el, key, None, Some(value))?;
                }

                if vnode.shape.contains(ShapeFlags::TEXT_CHILDREN) {
                    self.host().set_element_text(&el, vnode.text_content())?;
                } else if vnode.shape.contains(ShapeFlags::ARRAY_CHILDREN) {
                    self.mount_children(vnode.child_nodes_mut(), &el, None)?;
                }

                self.host().insert(&el, container, anchor)?;
            }
            VNodeType::Component(def) => {
                let def = def.clone();
                return self.mount_component(def, vnode, container, anchor);
            }
        }

        self.bump(|s| s.mounted += 1);
        Ok(())
    }

    pub(super) fn mount_children(
        self: &Rc<Self>,
        children: &mut [VNode<H::Node>],
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<()> {
        for child in children {
            self.patch(None, child, container, anchor)?;
        }
        Ok(())
    }

    fn patch_text(&self, old: &mut VNode<H::Node>, new: &mut VNode<H::Node>) -> Result<()> {
        let el = old.el.clone().ok_or(Error::Detached)?;
        if old.text_content() != new.text_content() {
            self.host().set_text(&el, new.text_content())?;
        }
        new.el = Some(el);
        self.bump(|s| s.patched += 1);
        Ok(())
    }

    fn patch_fragment(
        self: &Rc<Self>,
        old: &mut VNode<H::Node>,
        new: &mut VNode<H::Node>,
        container: &H::Node,
    ) -> Result<()> {
        new.el = old.el.clone();
        new.anchor = old.anchor.clone();
        let end = new.anchor.clone().ok_or(Error::Detached)?;
        self.patch_children(old, new, container, Some(&end))?;
        self.bump(|s| s.patched += 1);
        Ok(())
    }

    fn patch_element(
        self: &Rc<Self>,
        old: &mut VNode<H::Node>,
        new: &mut VNode<H::Node>,
    ) -> Result<()> {
        let el = old.el.clone().ok_or(Error::Detached)?;
        new.el = Some(el.clone());

        self.patch_props(&el, &old.props, &new.props)?;
        self.patch_children(old, new, &el, None)?;
        self.bump(|s| s.patched += 1);
        Ok(())
    }

    fn patch_props(&self, el: &H::Node, old: &Props, new: &Props) -> Result<()> {
        for (key, next) in new {
            let prev = old.get(key);
            if prev != Some(next) {
                self.host().patch_prop(el, key, prev, Some(next))?;
            }
        }
        for (key, prev) in old {
            if !new.contains_key(key) {
                self.host().patch_prop(el, key, Some(prev), None)?;
            }
        }
        Ok(())
    }

    /// Children transitions between none, text and node lists.
    fn patch_children(
        self: &Rc<Self>,
        old: &mut VNode<H::Node>,
        new: &mut VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<()> {
        let prev_shape = old.shape;
        let shape = new.shape;

        if shape.contains(ShapeFlags::TEXT_CHILDREN) {
            if prev_shape.contains(ShapeFlags::ARRAY_CHILDREN) {
                self.unmount_children(old.child_nodes_mut(), true)?;
            }
            if !prev_shape.contains(ShapeFlags::TEXT_CHILDREN)
                || old.text_content() != new.text_content()
            {
                self.host().set_element_text(container, new.text_content())?;
            }
        } else if prev_shape.contains(ShapeFlags::ARRAY_CHILDREN) {
            if shape.contains(ShapeFlags::ARRAY_CHILDREN) {
                self.patch_keyed_children(
                    old.child_nodes_mut(),
                    new.child_nodes_mut(),
                    container,
                    anchor,
                )?;
            } else {
                self.unmount_children(old.child_nodes_mut(), true)?;
            }
        } else {
            if prev_shape.contains(ShapeFlags::TEXT_CHILDREN) {
                self.host().set_element_text(container, "")?;
            }
            if shape.contains(ShapeFlags::ARRAY_CHILDREN) {
                self.mount_children(new.child_nodes_mut(), container, anchor)?;
            }
        }
        Ok(())
    }

    fn mount_component(
        self: &Rc<Self>,
        def: Rc<Component<H::Node>>,
        vnode: &mut VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<()> {
        let rt = self.runtime()?;

        let raw = RawObject::new();
        for (key, value) in &vnode.props {
            raw.insert(key.clone(), value.clone());
        }
        let props = rt.wrap(&raw);

        let instance = Rc::new_cyclic(|this: &Weak<ComponentInstance<H::Node>>| {
            let update_job = {
                let this = this.clone();
                Job::new(move || {
                    if let Some(instance) = this.upgrade() {
                        instance.update();
                    }
                })
            };

            ComponentInstance {
                def,
                props,
                sub_tree: RefCell::new(None),
                effect: RefCell::new(None),
                update_job,
                mount_target: RefCell::new(Some((container.clone(), anchor.cloned()))),
                mount_error: RefCell::new(None),
                needs_render: Cell::new(true),
                is_mounted: Cell::new(false),
                is_unmounted: Cell::new(false),
            }
        });

        let body = {
            let renderer = Rc::downgrade(self);
            let instance = Rc::downgrade(&instance);
            move || {
                let (Some(renderer), Some(instance)) = (renderer.upgrade(), instance.upgrade())
                else {
                    return;
                };
                if let Err(err) = renderer.render_component(&instance) {
                    if instance.is_mounted.get() {
                        tracing::error!(
                            component = instance.def.name(),
                            %err,
                            "component update failed"
                        );
                    } else {
                        *instance.mount_error.borrow_mut() = Some(err);
                    }
                }
            }
        };

        let scheduler = {
            let instance = Rc::downgrade(&instance);
            let runtime = rt.downgrade();
            move |_job: &Job| {
                let Some(instance) = instance.upgrade() else {
                    return;
                };
                instance.needs_render.set(true);
                if let Some(rt) = Runtime::upgrade(&runtime) {
                    rt.queue_job(instance.update_job.clone());
                }
            }
        };

        let effect = rt.effect(
            body,
            EffectOptions::default()
                .name("component")
                .lazy(true)
                .scheduler(scheduler),
        );
        *instance.effect.borrow_mut() = Some(effect.clone());
        vnode.component = Some(instance.clone());

        effect.run();

        let failed = instance.mount_error.borrow_mut().take();
        if let Some(err) = failed {
            return Err(err);
        }

        tracing::trace!(component = instance.def.name(), "component mounted");
        self.bump(|s| s.mounted += 1);
        Ok(())
    }

    /// One run of a component's subscriber: render, then mount or patch.
    fn render_component(self: &Rc<Self>, instance: &ComponentInstance<H::Node>) -> Result<()> {
        instance.needs_render.set(false);
        let mut next = instance.def.render(&instance.props);
        let rt = self.runtime()?;

        if !instance.is_mounted.get() {
            let (container, anchor) = instance
                .mount_target
                .borrow_mut()
                .take()
                .ok_or(Error::Detached)?;
            rt.untrack(|| self.patch(None, &mut next, &container, anchor.as_ref()))?;

            *instance.sub_tree.borrow_mut() = Some(next);
            instance.is_mounted.set(true);
            rt.untrack(|| instance.run_hooks(Lifecycle::Mounted));
            return Ok(());
        }

        let mut prev = instance
            .sub_tree
            .borrow_mut()
            .take()
            .ok_or(Error::Detached)?;
        let first = self.first_host_node(&prev).ok_or(Error::Detached)?;
        let container = self.host().parent_node(&first)?.ok_or(Error::Detached)?;
        let anchor = self.next_host_node(&prev)?;

        let patched =
            rt.untrack(|| self.patch(Some(&mut prev), &mut next, &container, anchor.as_ref()));
        *instance.sub_tree.borrow_mut() = Some(next);
        patched?;

        tracing::trace!(component = instance.def.name(), "component updated");
        rt.untrack(|| instance.run_hooks(Lifecycle::Updated));
        Ok(())
    }

    /// Parent re-rendered with the same component: pass the new props down.
    fn patch_component(&self, old: &mut VNode<H::Node>, new: &mut VNode<H::Node>) -> Result<()> {
        let instance = old.component.clone().ok_or(Error::Detached)?;
        new.component = Some(instance.clone());

        for (key, value) in &new.props {
            instance.props.set(key, value.clone());
        }
        for key in instance.props.raw().keys() {
            if !new.props.contains_key(&key) {
                instance.props.remove(&key);
            }
        }

        // A props change queued an update; render it now instead.
        instance.update();
        self.bump(|s| s.patched += 1);
        Ok(())
    }

    pub(super) fn unmount(&self, vnode: &mut VNode<H::Node>, remove: bool) -> Result<()> {
        if let Some(instance) = vnode.component.clone() {
            instance.is_unmounted.set(true);
            let effect = instance.effect.borrow_mut().take();
            if let Some(effect) = effect {
                effect.stop();
            }
            let tree = instance.sub_tree.borrow_mut().take();
            if let Some(mut tree) = tree {
                self.unmount(&mut tree, remove)?;
            }
            instance.run_hooks(Lifecycle::Unmounted);
            if remove {
                self.bump(|s| s.unmounted += 1);
            }
            tracing::trace!(component = instance.def.name(), "component unmounted");
            return Ok(());
        }

        // Removing an element takes its subtree along; a fragment has no
        // host node of its own, so its children go one by one.
        let remove_children = remove && vnode.is_fragment();
        self.unmount_children(vnode.child_nodes_mut(), remove_children)?;

        if remove {
            if let Some(el) = &vnode.el {
                self.host().remove(el)?;
            }
            if let Some(end) = &vnode.anchor {
                self.host().remove(end)?;
            }
            self.bump(|s| s.unmounted += 1);
        }
        Ok(())
    }

    fn unmount_children(&self, children: &mut [VNode<H::Node>], remove: bool) -> Result<()> {
        for child in children {
            self.unmount(child, remove)?;
        }
        Ok(())
    }

    /// Re-insert every host node of `vnode` before `anchor`.
    pub(super) fn move_vnode(
        &self,
        vnode: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<()> {
        if let Some(instance) = &vnode.component {
            let tree = instance.sub_tree.borrow();
            return match tree.as_ref() {
                Some(tree) => self.move_vnode(tree, container, anchor),
                None => Err(Error::Detached),
            };
        }

        let el = vnode.el.as_ref().ok_or(Error::Detached)?;
        self.host().insert(el, container, anchor)?;

        if vnode.is_fragment() {
            if let Children::Nodes(children) = &vnode.children {
                for child in children {
                    self.move_vnode(child, container, anchor)?;
                }
            }
            let end = vnode.anchor.as_ref().ok_or(Error::Detached)?;
            self.host().insert(end, container, anchor)?;
        }
        Ok(())
    }

    /// First host node of `vnode`, descending into component subtrees.
    pub(super) fn first_host_node(&self, vnode: &VNode<H::Node>) -> Option<H::Node> {
        match &vnode.component {
            Some(instance) => instance
                .sub_tree
                .borrow()
                .as_ref()
                .and_then(|tree| self.first_host_node(tree)),
            None => vnode.el.clone(),
        }
    }

    /// Host node following everything `vnode` rendered.
    fn next_host_node(&self, vnode: &VNode<H::Node>) -> Result<Option<H::Node>> {
        if let Some(instance) = &vnode.component {
            let tree = instance.sub_tree.borrow();
            return match tree.as_ref() {
                Some(tree) => self.next_host_node(tree),
                None => Ok(None),
            };
        }

        let last = vnode.anchor.as_ref().or(vnode.el.as_ref());
        match last {
            Some(node) => self.host.borrow().next_sibling(node),
            None => Ok(None),
        }
    }
}

impl<N> Drop for ComponentInstance<N> {
    fn drop(&mut self) {
        if let Some(effect) = self.effect.get_mut().take() {
            effect.stop();
        }
    }
}
