//! Traversal trail: the breadcrumb path from the root to the current node.
//!
//! Every pass pushes one entry when it descends into a field and pops it on
//! the way back, so the trail always describes exactly the current path.
//! It bounds recursion depth, detects structural loops while resolving
//! pointers, and renders error messages such as:
//!
//! ```text
//! [0] (Hive, addr=0) .items (Array, addr=4) [1] (Bee*, addr=2)
//! ```

use std::fmt;

use super::value::Identity;

/// Field name or list index of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    /// The traversal root.
    Root,
    /// Named field of a record or object.
    Name(String),
    /// Position in a list.
    Index(usize),
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Name(name) => write!(f, ".{name}"),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl From<&str> for FieldKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<usize> for FieldKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// One breadcrumb: which field was entered and what it holds.
#[derive(Debug, Clone)]
pub struct TrailEntry {
    /// Field or index entered.
    pub key: FieldKey,
    /// Class or kind name of the node at that field.
    pub kind: String,
    /// Address of the node, once known.
    pub addr: Option<usize>,
    /// Identity of the node, for in-memory passes.
    pub identity: Option<Identity>,
    /// Whether the node is a pointer.
    pub pointer: bool,
}

impl TrailEntry {
    /// Create an entry with no address or identity.
    pub fn new(key: FieldKey, kind: impl Into<String>) -> Self {
        Self {
            key,
            kind: kind.into(),
            addr: None,
            identity: None,
            pointer: false,
        }
    }

    /// Set the address.
    pub fn with_addr(mut self, addr: Option<usize>) -> Self {
        self.addr = addr;
        self
    }

    /// Set the identity.
    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    /// Mark as a pointer.
    pub fn with_pointer(mut self, pointer: bool) -> Self {
        self.pointer = pointer;
        self
    }

    fn describe(&self) -> String {
        match self.kind.as_str() {
            "literal" | "null" => self.kind.clone(),
            kind => {
                let star = if self.pointer { "*" } else { "" };
                match self.addr {
                    Some(addr) => format!("({kind}{star}, addr={addr})"),
                    None => format!("({kind}{star})"),
                }
            }
        }
    }
}

/// The current traversal path.
#[derive(Debug, Clone, Default)]
pub struct Trail {
    entries: Vec<TrailEntry>,
}

impl Trail {
    /// Create an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the trail is deeper than `max_depth`.
    pub fn exceeds(&self, max_depth: usize) -> bool {
        self.entries.len() > max_depth
    }

    /// Enter a field.
    pub fn push(&mut self, entry: TrailEntry) {
        self.entries.push(entry);
    }

    /// Leave the current field.
    pub fn pop(&mut self) -> Option<TrailEntry> {
        self.entries.pop()
    }

    /// Current entry.
    pub fn last(&self) -> Option<&TrailEntry> {
        self.entries.last()
    }

    /// Record the address of the current node once it is assigned.
    pub fn set_last_addr(&mut self, addr: Option<usize>) {
        if let Some(entry) = self.entries.last_mut() {
            entry.addr = addr;
        }
    }

    /// All entries, root first.
    pub fn entries(&self) -> &[TrailEntry] {
        &self.entries
    }

    /// First position holding the node with this identity.
    pub fn position(&self, identity: Identity) -> Option<usize> {
        self.entries.iter().position(|e| e.identity == Some(identity))
    }

    /// Render the whole path.
    pub fn render(&self) -> String {
        self.render_inner(None)
    }

    /// Render the path marking a loop from `loop_index` back to the end.
    pub fn render_loop(&self, loop_index: usize) -> String {
        self.render_inner(Some(loop_index))
    }

    /// Render only the current step, indented by depth.
    pub fn render_step(&self) -> String {
        match self.entries.last() {
            Some(entry) => format!(
                "{}{} {}",
                "  ".repeat(self.entries.len()),
                entry.key,
                entry.describe()
            ),
            None => String::new(),
        }
    }

    fn render_inner(&self, loop_index: Option<usize>) -> String {
        let last = self.entries.len().saturating_sub(1);
        let parts: Vec<String> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let mut part = format!("{} {}", entry.key, entry.describe());
                if let Some(loop_index) = loop_index {
                    if i == loop_index {
                        part.push_str(" <-");
                    }
                    if i == last {
                        part.push_str(" ->");
                    }
                }
                part
            })
            .collect();
        parts.join(" ")
    }
}

impl fmt::Display for Trail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_render() {
        let mut trail = Trail::new();
        trail.push(TrailEntry::new(FieldKey::Index(0), "Hive").with_addr(Some(0)));
        trail.push(TrailEntry::new("items".into(), "Array"));
        trail.set_last_addr(Some(4));
        trail.push(TrailEntry::new(1.into(), "Bee").with_addr(Some(2)).with_pointer(true));

        assert_eq!(
            trail.render(),
            "[0] (Hive, addr=0) .items (Array, addr=4) [1] (Bee*, addr=2)"
        );
        assert_eq!(trail.render_step(), "      [1] (Bee*, addr=2)");
    }

    #[test]
    fn test_render_loop_markers() {
        let mut trail = Trail::new();
        trail.push(TrailEntry::new(FieldKey::Root, "Array"));
        trail.push(TrailEntry::new("a".into(), "Object"));
        trail.push(TrailEntry::new("b".into(), "Object"));

        assert_eq!(
            trail.render_loop(1),
            "root (Array) .a (Object) <- .b (Object) ->"
        );
    }

    #[test]
    fn test_depth_and_position() {
        let node = Value::record([("x", Value::from(1))]);
        let mut trail = Trail::new();
        trail.push(TrailEntry::new(FieldKey::Root, "Object").with_identity(node.identity()));
        trail.push(TrailEntry::new("x".into(), "literal"));

        assert_eq!(trail.position(node.identity().unwrap()), Some(0));
        assert!(trail.exceeds(1));
        assert!(!trail.exceeds(2));

        trail.pop();
        trail.pop();
        assert!(trail.is_empty());
    }
}
