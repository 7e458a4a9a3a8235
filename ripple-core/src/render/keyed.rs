//! Keyed Reconciler
//!
//! Matches an old and a new sibling sequence and mutates the host so its
//! order matches the new one.
//!
//! # Algorithm
//!
//! 1. Head scan: patch pairs from the front while they are the same node.
//! 2. Tail scan: the same from the back.
//! 3. If only new nodes remain, mount them before the node after the window.
//! 4. If only old nodes remain, unmount them.
//! 5. Otherwise map new keys to positions, walk the old window and either
//!    patch each old node against its new counterpart (recording its old
//!    position in a new-to-old table) or unmount it.
//! 6. Walk the new window backwards. Nodes with no old counterpart are
//!    mounted; matched nodes on the longest increasing subsequence of the
//!    table stay put; the rest move before the next placed sibling.
//!
//! Matched nodes minus the LIS length is the number of moves, the fewest
//! single anchored moves that reach the new order.

use std::collections::HashMap;
use std::rc::Rc;

use super::host::HostOps;
use super::lis::longest_increasing_subsequence;
use super::renderer::RendererInner;
use super::vnode::{Key, VNode};
use crate::error::Result;

impl<H: HostOps + 'static> RendererInner<H> {
    pub(super) fn patch_keyed_children(
        self: &Rc<Self>,
        old: &mut [VNode<H::Node>],
        new: &mut [VNode<H::Node>],
        container: &H::Node,
        parent_anchor: Option<&H::Node>,
    ) -> Result<()> {
        let mut i = 0usize;
        // Exclusive ends of the remaining windows.
        let mut old_end = old.len();
        let mut new_end = new.len();

        while i < old_end && i < new_end && old[i].is_same(&new[i]) {
            self.patch(Some(&mut old[i]), &mut new[i], container, None)?;
            i += 1;
        }

        while i < old_end && i < new_end && old[old_end - 1].is_same(&new[new_end - 1]) {
            self.patch(
                Some(&mut old[old_end - 1]),
                &mut new[new_end - 1],
                container,
                None,
            )?;
            old_end -= 1;
            new_end -= 1;
        }

        if i == old_end {
            if i < new_end {
                let anchor = self.anchor_after(new, new_end, parent_anchor);
                for node in &mut new[i..new_end] {
                    self.patch(None, node, container, anchor.as_ref())?;
                }
            }
            return Ok(());
        }

        if i == new_end {
            for node in &mut old[i..old_end] {
                self.unmount(node, true)?;
            }
            return Ok(());
        }

        self.patch_unordered(
            &mut old[i..old_end],
            new,
            i..new_end,
            container,
            parent_anchor,
        )
    }

    /// First host node at or after `index` in `siblings`, else the parent's.
    fn anchor_after(
        &self,
        siblings: &[VNode<H::Node>],
        index: usize,
        parent_anchor: Option<&H::Node>,
    ) -> Option<H::Node> {
        match siblings.get(index) {
            Some(next) => self.first_host_node(next),
            None => parent_anchor.cloned(),
        }
    }

    fn patch_unordered(
        self: &Rc<Self>,
        old: &mut [VNode<H::Node>],
        new: &mut [VNode<H::Node>],
        window: std::ops::Range<usize>,
        container: &H::Node,
        parent_anchor: Option<&H::Node>,
    ) -> Result<()> {
        let start = window.start;
        let to_be_patched = window.len();

        // Later duplicates win.
        let mut key_to_new: HashMap<Key, usize> = HashMap::with_capacity(to_be_patched);
        for (offset, node) in new[window].iter().enumerate() {
            if let Some(key) = &node.key {
                key_to_new.insert(key.clone(), offset);
            }
        }

        // 1-based old position per new offset; 0 means mount fresh.
        let mut new_to_old = vec![0usize; to_be_patched];
        let mut moved = false;
        let mut max_offset_so_far = 0;
        let mut patched = 0;

        for (old_index, old_node) in old.iter_mut().enumerate() {
            if patched >= to_be_patched {
                self.unmount(old_node, true)?;
                continue;
            }

            let offset = match &old_node.key {
                Some(key) => key_to_new.get(key).copied(),
                None => (0..to_be_patched).find(|&offset| {
                    let candidate = &new[start + offset];
                    new_to_old[offset] == 0
                        && candidate.key.is_none()
                        && old_node.is_same(candidate)
                }),
            };

            match offset {
                Some(offset) if new_to_old[offset] == 0 => {
                    new_to_old[offset] = old_index + 1;
                    if offset >= max_offset_so_far {
                        max_offset_so_far = offset;
                    } else {
                        moved = true;
                    }
                    self.patch(Some(old_node), &mut new[start + offset], container, None)?;
                    patched += 1;
                }
                _ => self.unmount(old_node, true)?,
            }
        }

        let sequence = if moved {
            longest_increasing_subsequence(&new_to_old)
        } else {
            Vec::new()
        };

        let lis_length = if moved { sequence.len() } else { patched };
        self.bump(|s| {
            s.windows += 1;
            s.lis_length += lis_length;
        });
        tracing::trace!(
            window = to_be_patched,
            matched = patched,
            lis_length,
            moves = patched - lis_length,
            "reconciling unordered window"
        );

        let mut on_sequence = sequence.len();
        for offset in (0..to_be_patched).rev() {
            let index = start + offset;
            let anchor = self.anchor_after(new, index + 1, parent_anchor);

            if new_to_old[offset] == 0 {
                self.patch(None, &mut new[index], container, anchor.as_ref())?;
            } else if moved {
                if on_sequence > 0 && sequence[on_sequence - 1] == offset {
                    on_sequence -= 1;
                } else {
                    self.move_vnode(&new[index], container, anchor.as_ref())?;
                    self.bump(|s| s.moved += 1);
                }
            }
        }
        Ok(())
    }
}
