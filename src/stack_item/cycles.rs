//! Reclaiming reference cycles between containers
//!
//! Arrays and maps are reference counted, so `A.append(A)` or `map[k] = map`
//! keeps the container alive after every outside handle is gone. Each
//! container is tracked through a `Weak` in a per-thread registry, and
//! `collect_cycles` finds the ones whose every strong reference comes from
//! another tracked container:
//!
//! 1. start each container's count at its strong count
//! 2. subtract one for every reference held by another tracked container
//! 3. anything left above zero is held from outside; it and everything it
//!    reaches stays alive
//! 4. the rest is unreachable garbage and is emptied, which breaks its cycles
//!
//! The engine runs a collection from `clean` and on drop.

use super::compound::{ArrayCell, MapCell};
use super::StackItem;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Registry size below which dead entries are not pruned
const PRUNE_FLOOR: usize = 1024;

enum Tracked {
    Array(Weak<ArrayCell>),
    Map(Weak<MapCell>),
}

impl Tracked {
    fn is_alive(&self) -> bool {
        match self {
            Tracked::Array(weak) => weak.strong_count() > 0,
            Tracked::Map(weak) => weak.strong_count() > 0,
        }
    }

    fn upgrade(&self) -> Option<Node> {
        match self {
            Tracked::Array(weak) => weak.upgrade().map(Node::Array),
            Tracked::Map(weak) => weak.upgrade().map(Node::Map),
        }
    }
}

struct Registry {
    tracked: Vec<Tracked>,
    prune_at: usize,
}

impl Registry {
    fn push(&mut self, entry: Tracked) {
        self.tracked.push(entry);
        if self.tracked.len() >= self.prune_at {
            self.tracked.retain(Tracked::is_alive);
            self.prune_at = (self.tracked.len() * 2).max(PRUNE_FLOOR);
        }
    }
}

thread_local! {
    static REGISTRY: RefCell<Registry> = const {
        RefCell::new(Registry {
            tracked: Vec::new(),
            prune_at: PRUNE_FLOOR,
        })
    };
}

fn track(entry: Tracked) {
    if REGISTRY.try_with(|registry| registry.borrow_mut().push(entry)).is_err() {
        tracing::trace!("container created during thread shutdown is not tracked");
    }
}

pub(super) fn track_array(cell: &Rc<ArrayCell>) {
    track(Tracked::Array(Rc::downgrade(cell)));
}

pub(super) fn track_map(cell: &Rc<MapCell>) {
    track(Tracked::Map(Rc::downgrade(cell)));
}

/// A live container, held strongly for the duration of a collection
enum Node {
    Array(Rc<ArrayCell>),
    Map(Rc<MapCell>),
}

impl Node {
    fn ptr(&self) -> *const () {
        match self {
            Node::Array(cell) => Rc::as_ptr(cell) as *const (),
            Node::Map(cell) => Rc::as_ptr(cell) as *const (),
        }
    }

    fn strong_count(&self) -> usize {
        match self {
            Node::Array(cell) => Rc::strong_count(cell),
            Node::Map(cell) => Rc::strong_count(cell),
        }
    }

    /// Pointers of the containers this one references directly
    ///
    /// A container that is mutably borrowed reports nothing, which only ever
    /// keeps more alive.
    fn children(&self) -> Vec<*const ()> {
        match self {
            Node::Array(cell) => match cell.try_borrow() {
                Ok(items) => items.iter().filter_map(container_ptr).collect(),
                Err(_) => Vec::new(),
            },
            Node::Map(cell) => match cell.try_borrow() {
                Ok(entries) => entries
                    .iter()
                    .flat_map(|(key, value)| [key, value])
                    .filter_map(container_ptr)
                    .collect(),
                Err(_) => Vec::new(),
            },
        }
    }

    /// Empty the container; the removed items are returned so they drop
    /// after the borrow ends
    fn clear(&self) -> Vec<StackItem> {
        match self {
            Node::Array(cell) => cell
                .try_borrow_mut()
                .map(|mut items| std::mem::take(&mut *items))
                .unwrap_or_default(),
            Node::Map(cell) => cell
                .try_borrow_mut()
                .map(|mut entries| entries.drain(..).flat_map(|(key, value)| [key, value]).collect())
                .unwrap_or_default(),
        }
    }
}

fn container_ptr(item: &StackItem) -> Option<*const ()> {
    match item {
        StackItem::Array(array) => Some(array.as_ptr()),
        StackItem::Struct(s) => Some(s.as_ptr()),
        StackItem::Map(map) => Some(map.as_ptr()),
        _ => None,
    }
}

/// Empty every container on this thread that only reference cycles keep alive
///
/// Returns how many containers were emptied.
pub fn collect_cycles() -> usize {
    let nodes: Vec<Node> = REGISTRY
        .try_with(|registry| {
            let mut registry = registry.borrow_mut();
            registry.tracked.retain(Tracked::is_alive);
            registry.prune_at = (registry.tracked.len() * 2).max(PRUNE_FLOOR);
            registry.tracked.iter().filter_map(Tracked::upgrade).collect()
        })
        .unwrap_or_default();

    let index: HashMap<*const (), usize> = nodes.iter().enumerate().map(|(i, node)| (node.ptr(), i)).collect();
    let edges: Vec<Vec<usize>> = nodes
        .iter()
        .map(|node| node.children().iter().filter_map(|ptr| index.get(ptr).copied()).collect())
        .collect();

    // the handle in `nodes` is not an outside reference
    let mut outside: Vec<usize> = nodes.iter().map(|node| node.strong_count() - 1).collect();
    for targets in &edges {
        for &target in targets {
            outside[target] = outside[target].saturating_sub(1);
        }
    }

    let mut alive = vec![false; nodes.len()];
    let mut pending: Vec<usize> = (0..nodes.len()).filter(|&i| outside[i] > 0).collect();
    for &i in &pending {
        alive[i] = true;
    }
    while let Some(i) = pending.pop() {
        for &target in &edges[i] {
            if !alive[target] {
                alive[target] = true;
                pending.push(target);
            }
        }
    }

    let mut garbage = Vec::new();
    let mut emptied = 0;
    for (node, _) in nodes.iter().zip(&alive).filter(|(_, alive)| !**alive) {
        garbage.extend(node.clear());
        emptied += 1;
    }
    if emptied > 0 {
        tracing::debug!(emptied, "reclaimed cyclic containers");
    }

    // containers in `garbage` are still held by `nodes` and free with it
    drop(garbage);
    drop(nodes);
    emptied
}
