//! Components.
//!
//! A [`Component`] is a render function from its props to a subtree. Each
//! mounted instance runs that function inside its own subscriber, so the
//! subtree re-renders when anything the function read changes. Re-renders are
//! queued on the update scheduler: a burst of writes costs one re-render.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::vnode::VNode;
use crate::error::Error;
use crate::reactive::{Effect, Job, Reactive};

type RenderFn<N> = Box<dyn Fn(&Reactive) -> VNode<N>>;
type Hook = Box<dyn Fn()>;

/// A component definition. Share it with `Rc` and instantiate with
/// [`VNode::component`].
pub struct Component<N> {
    name: &'static str,
    render: RenderFn<N>,
    mounted: Vec<Hook>,
    updated: Vec<Hook>,
    unmounted: Vec<Hook>,
}

impl<N> Component<N> {
    /// Define a component. `render` receives the instance's tracked props.
    pub fn new<F>(name: &'static str, render: F) -> Self
    where
        F: Fn(&Reactive) -> VNode<N> + 'static,
    {
        Self {
            name,
            render: Box::new(render),
            mounted: Vec::new(),
            updated: Vec::new(),
            unmounted: Vec::new(),
        }
    }

    /// Run `f` after the first render is in the host tree.
    pub fn on_mounted(mut self, f: impl Fn() + 'static) -> Self {
        self.mounted.push(Box::new(f));
        self
    }

    /// Run `f` after every re-render.
    pub fn on_updated(mut self, f: impl Fn() + 'static) -> Self {
        self.updated.push(Box::new(f));
        self
    }

    /// Run `f` once the instance is removed.
    pub fn on_unmounted(mut self, f: impl Fn() + 'static) -> Self {
        self.unmounted.push(Box::new(f));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, props: &Reactive) -> VNode<N> {
        (self.render)(props)
    }
}

impl<N> fmt::Debug for Component<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy)]
pub(crate) enum Lifecycle {
    Mounted,
    Updated,
    Unmounted,
}

/// State of one mounted component.
pub(crate) struct ComponentInstance<N> {
    pub def: Rc<Component<N>>,
    pub props: Reactive,
    pub sub_tree: RefCell<Option<VNode<N>>>,
    pub effect: RefCell<Option<Effect<()>>>,

    /// Queued on the scheduler when a dependency changes.
    pub update_job: Job,

    /// Where the first render goes. Taken by the first run.
    pub mount_target: RefCell<Option<(N, Option<N>)>>,

    /// Failure of the first render, handed back to the mounting call.
    pub mount_error: RefCell<Option<Error>>,

    pub needs_render: Cell<bool>,
    pub is_mounted: Cell<bool>,
    pub is_unmounted: Cell<bool>,
}

impl<N> ComponentInstance<N> {
    /// Re-render if something changed since the last render.
    pub fn update(&self) {
        if self.is_unmounted.get() || !self.needs_render.get() {
            return;
        }
        let effect = self.effect.borrow().clone();
        if let Some(effect) = effect {
            effect.run();
        }
    }

    pub fn run_hooks(&self, stage: Lifecycle) {
        let hooks = match stage {
            Lifecycle::Mounted => &self.def.mounted,
            Lifecycle::Updated => &self.def.updated,
            Lifecycle::Unmounted => &self.def.unmounted,
        };
        for hook in hooks {
            hook();
        }
    }
}
