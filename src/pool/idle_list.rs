//! Recency-ordered list of idle handles
//!
//! A doubly-linked list whose nodes live in a slot arena and link to each
//! other by index. The front holds the most recently returned entry (reused
//! first), the back holds the least recently returned one (evicted first).
//!
//! The list has no lock of its own: it sits inside the pool state and is only
//! touched while the pool lock is held.

use std::fmt;

struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Arena-backed doubly-linked list with O(1) push/pop at both ends
pub struct IdleList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    front: Option<usize>,
    back: Option<usize>,
    len: usize,
}

impl<T> IdleList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            front: None,
            back: None,
            len: 0,
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Number of entries currently linked
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Most recently returned entry
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.front.and_then(|idx| self.node(idx)).map(|n| &n.value)
    }

    /// Least recently returned entry
    #[must_use]
    pub fn back(&self) -> Option<&T> {
        self.back.and_then(|idx| self.node(idx)).map(|n| &n.value)
    }

    /// Link `value` at the front
    pub fn push_front(&mut self, value: T) {
        let node = Node {
            value,
            prev: None,
            next: self.front,
        };

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        match self.front.and_then(|old| self.node_mut(old)) {
            Some(old_front) => old_front.prev = Some(idx),
            None => self.back = Some(idx),
        }
        self.front = Some(idx);
        self.len += 1;
    }

    /// Unlink and return the front entry
    pub fn pop_front(&mut self) -> Option<T> {
        let idx = self.front?;
        let node = self.unlink(idx)?;
        self.front = node.next;
        match node.next.and_then(|next| self.node_mut(next)) {
            Some(next) => next.prev = None,
            None => self.back = None,
        }
        Some(node.value)
    }

    /// Unlink and return the back entry
    pub fn pop_back(&mut self) -> Option<T> {
        let idx = self.back?;
        let node = self.unlink(idx)?;
        self.back = node.prev;
        match node.prev.and_then(|prev| self.node_mut(prev)) {
            Some(prev) => prev.next = None,
            None => self.front = None,
        }
        Some(node.value)
    }

    /// Detach every entry, front to back, leaving the list empty
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        while let Some(value) = self.pop_front() {
            out.push(value);
        }
        self.slots.clear();
        self.free.clear();
        out
    }

    /// Iterate front to back
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.front,
            remaining: self.len,
        }
    }

    fn node(&self, idx: usize) -> Option<&Node<T>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    // Vacates the slot; the caller repairs front/back and neighbour links.
    fn unlink(&mut self, idx: usize) -> Option<Node<T>> {
        let node = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);
        self.len -= 1;
        Some(node)
    }
}

impl<T> Default for IdleList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for IdleList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Front-to-back iterator over an [`IdleList`]
pub struct Iter<'a, T> {
    list: &'a IdleList<T>,
    cursor: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.node(self.cursor?)?;
        self.cursor = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
