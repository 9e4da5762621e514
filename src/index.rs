/// In-memory device index: an ordered binary search tree keyed by device id.
///
/// Nodes live in an arena (a Vec) and reference children by index, so the
/// tree needs no recursion and no boxed links. The index is built once at
/// startup from the metadata table and never mutated afterwards.
///
/// Two long-standing policies are preserved on purpose and pinned by tests:
/// equal keys descend into the RIGHT subtree instead of overwriting, and
/// `find` stops at the first exact match on the way down. Together they mean
/// a duplicated device id always resolves to the first-inserted metadata.
/// The tree is unbalanced; a sorted insertion order degrades lookups to
/// O(n) depth, which is accepted for the device counts involved.
use crate::models::Device;

#[derive(Debug)]
struct Node {
    key: String,
    device: Device,
    left: Option<usize>,
    right: Option<usize>,
}

#[derive(Debug, Default)]
pub struct DeviceIndex {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl DeviceIndex {
    pub fn new() -> DeviceIndex {
        DeviceIndex {
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a device under `key`. Duplicate keys are kept, not replaced:
    /// an equal key walks right, becoming a descendant of the original.
    pub fn insert(&mut self, key: String, device: Device) {
        let new_index = self.nodes.len();
        self.nodes.push(Node {
            key,
            device,
            left: None,
            right: None,
        });

        let Some(mut current) = self.root else {
            self.root = Some(new_index);
            return;
        };

        loop {
            // Indexing is safe: child links only ever point into the arena.
            let node = &self.nodes[current];
            let go_left = self.nodes[new_index].key < node.key;
            let slot = if go_left { node.left } else { node.right };
            match slot {
                Some(child) => current = child,
                None => {
                    let node = &mut self.nodes[current];
                    if go_left {
                        node.left = Some(new_index);
                    } else {
                        node.right = Some(new_index);
                    }
                    return;
                }
            }
        }
    }

    /// Look up a device by exact id. The walk stops at the first match
    /// top-down, so duplicated keys return the first-inserted device.
    pub fn find(&self, key: &str) -> Option<&Device> {
        let mut current = self.root;
        while let Some(index) = current {
            let node = &self.nodes[index];
            if key == node.key {
                return Some(&node.device);
            }
            current = if key < node.key.as_str() {
                node.left
            } else {
                node.right
            };
        }
        None
    }
}
