//! Recency List Module
//!
//! Doubly linked list ordering live entries by most recent use.

// == Node Handle ==
/// Stable handle to a node in a [`RecencyList`].
///
/// Handles carry the generation of the node they were issued for, so a
/// handle to a removed node never aliases a node that later reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
    generation: u64,
}

// == Recency List ==
/// Tracks access order for LRU eviction.
///
/// Nodes live in a slot arena linked by index:
/// - Front = Most recently used
/// - Back = Least recently used
///
/// Every operation except iteration and clearing is O(1). Operations given a
/// stale [`NodeId`] do nothing.
#[derive(Debug)]
pub struct RecencyList<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    next_generation: u64,
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecencyList<T> {
    // == Constructor ==
    /// Creates a new empty list.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            next_generation: 0,
        }
    }

    // == Push Front ==
    /// Inserts a value as the most recently used node.
    pub fn push_front(&mut self, value: T) -> NodeId {
        let generation = self.next_generation;
        self.next_generation += 1;

        let node = Node {
            value,
            prev: None,
            next: None,
            generation,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index] = Some(node);
                index
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };

        self.link_front(index);
        self.len += 1;
        NodeId { index, generation }
    }

    // == Move To Front ==
    /// Marks a node as recently used.
    ///
    /// Returns false if the handle is stale.
    pub fn move_to_front(&mut self, id: NodeId) -> bool {
        if self.node(id).is_none() {
            return false;
        }
        if self.head != Some(id.index) {
            self.unlink(id.index);
            self.link_front(id.index);
        }
        true
    }

    // == Remove ==
    /// Unlinks a node and returns its value.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        self.node(id)?;
        self.unlink(id.index);
        self.len -= 1;
        self.free.push(id.index);
        self.nodes[id.index].take().map(|node| node.value)
    }

    // == Replace ==
    /// Swaps the value stored in a node without changing its position.
    pub fn replace(&mut self, id: NodeId, value: T) -> Option<T> {
        let slot = self.nodes.get_mut(id.index)?.as_mut()?;
        if slot.generation != id.generation {
            return None;
        }
        Some(std::mem::replace(&mut slot.value, value))
    }

    // == Peek ==
    /// Returns the least recently used node without removing it.
    pub fn back(&self) -> Option<(NodeId, &T)> {
        self.handle(self.tail?)
    }

    /// Returns the most recently used node.
    pub fn front(&self) -> Option<(NodeId, &T)> {
        self.handle(self.head?)
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.node(id).map(|node| &node.value)
    }

    /// Iterates values from most to least recently used.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
            remaining: self.len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every node. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    // == Linking ==
    fn node(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes
            .get(id.index)?
            .as_ref()
            .filter(|node| node.generation == id.generation)
    }

    fn handle(&self, index: usize) -> Option<(NodeId, &T)> {
        let node = self.nodes.get(index)?.as_ref()?;
        let id = NodeId {
            index,
            generation: node.generation,
        };
        Some((id, &node.value))
    }

    fn slot_mut(&mut self, index: usize) -> &mut Node<T> {
        self.nodes[index]
            .as_mut()
            .expect("linked index points at a vacant slot")
    }

    fn link_front(&mut self, index: usize) {
        let old_head = self.head;
        {
            let node = self.slot_mut(index);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(head) => self.slot_mut(head).prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let node = self.slot_mut(index);
            (node.prev.take(), node.next.take())
        };
        match prev {
            Some(prev) => self.slot_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slot_mut(next).prev = prev,
            None => self.tail = prev,
        }
    }
}

// == Iterator ==
/// Front-to-back iterator over a [`RecencyList`].
pub struct Iter<'a, T> {
    list: &'a RecencyList<T>,
    cursor: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.nodes.get(self.cursor?)?.as_ref()?;
        self.cursor = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
