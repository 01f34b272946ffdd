//! In-memory live document.
//!
//! An arena of elements rooted at `<html>` with a `<body>`. Child-list changes
//! under connected nodes are broadcast as [`Mutation`] records, clicks are
//! dispatched with bubbling, and the load lifecycle is tracked as a
//! [`ReadyState`]. Removed nodes stay in the arena so they can be re-attached;
//! writes to them are inert. Arena slots are never reclaimed, so the arena
//! grows with every element created. Click listeners are released explicitly
//! with [`Document::remove_click_listeners`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tokio::sync::{broadcast, watch};

use super::selector::Selector;
use crate::credentials::LanguageSource;

const MUTATION_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("Node {0:?} does not belong to this document")]
    UnknownNode(NodeId),

    #[error("Node {0:?} is not a child of {1:?}")]
    NotAChild(NodeId, NodeId),

    #[error("Inserting {0:?} under {1:?} would create a cycle")]
    HierarchyRequest(NodeId, NodeId),
}

pub type DomResult<T> = Result<T, DomError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// A child-list change observed under the connected tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    ChildAdded { parent: NodeId, child: NodeId },
    ChildRemoved { parent: NodeId, child: NodeId },
}

/// Click event passed to listeners along the propagation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickEvent {
    pub target: NodeId,
    pub current_target: NodeId,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl ClickEvent {
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

pub type ClickListener = Arc<dyn Fn(&mut ClickEvent) + Send + Sync>;

#[derive(Debug)]
struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Tree {
    nodes: Vec<Element>,
}

impl Tree {
    fn get(&self, id: NodeId) -> DomResult<&Element> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> DomResult<&mut Element> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == Document::ROOT {
                return true;
            }
            current = self.nodes.get(node.0).and_then(|e| e.parent);
        }
        false
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id.0).and_then(|e| e.parent);
        }
        false
    }

    fn detach(&mut self, child: NodeId) -> DomResult<Option<NodeId>> {
        let Some(parent) = self.get(child)?.parent else {
            return Ok(None);
        };
        self.get_mut(parent)?.children.retain(|c| *c != child);
        self.get_mut(child)?.parent = None;
        Ok(Some(parent))
    }

    /// Pre-order descendants of `scope`, excluding `scope`.
    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(scope.0) {
            Some(e) => e.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(e) = self.nodes.get(id.0) {
                stack.extend(e.children.iter().rev().copied());
            }
        }
        out
    }
}

pub struct Document {
    tree: RwLock<Tree>,
    listeners: RwLock<HashMap<NodeId, Vec<ClickListener>>>,
    mutations: broadcast::Sender<Mutation>,
    ready: watch::Sender<ReadyState>,
}

impl Document {
    const ROOT: NodeId = NodeId(0);
    const BODY: NodeId = NodeId(1);

    /// A `Loading` document holding an empty `<html><body></body></html>`.
    pub fn new() -> Self {
        let root = Element {
            tag: "html".to_string(),
            attributes: BTreeMap::new(),
            parent: None,
            children: vec![Self::BODY],
        };
        let body = Element {
            tag: "body".to_string(),
            attributes: BTreeMap::new(),
            parent: Some(Self::ROOT),
            children: Vec::new(),
        };
        let (mutations, _) = broadcast::channel(MUTATION_CHANNEL_CAPACITY);
        let (ready, _) = watch::channel(ReadyState::Loading);

        Self {
            tree: RwLock::new(Tree {
                nodes: vec![root, body],
            }),
            listeners: RwLock::new(HashMap::new()),
            mutations,
            ready,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tree> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tree> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, mutation: Mutation) {
        // No subscribers is fine.
        let _ = self.mutations.send(mutation);
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    pub fn body(&self) -> NodeId {
        Self::BODY
    }

    // ==================== Lifecycle ====================

    pub fn ready_state(&self) -> ReadyState {
        *self.ready.borrow()
    }

    pub fn set_ready_state(&self, state: ReadyState) {
        self.ready.send_replace(state);
    }

    /// Resolve once the document has left `Loading`.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so this cannot close early.
        let _ = rx.wait_for(|state| *state != ReadyState::Loading).await;
    }

    /// Receive child-list mutations from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Mutation> {
        self.mutations.subscribe()
    }

    // ==================== Elements ====================

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        let mut tree = self.write();
        tree.nodes.push(Element {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        });
        NodeId(tree.nodes.len() - 1)
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.read()
            .get(node)
            .ok()
            .and_then(|e| e.attributes.get(name).cloned())
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> DomResult<()> {
        self.write()
            .get_mut(node)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .map_or(false, |c| c.split_ascii_whitespace().any(|c| c == class))
    }

    pub fn add_class(&self, node: NodeId, class: &str) -> DomResult<()> {
        let mut tree = self.write();
        let attrs = &mut tree.get_mut(node)?.attributes;
        let current = attrs.get("class").cloned().unwrap_or_default();
        if !current.split_ascii_whitespace().any(|c| c == class) {
            let updated = if current.trim().is_empty() {
                class.to_string()
            } else {
                format!("{} {}", current.trim_end(), class)
            };
            attrs.insert("class".to_string(), updated);
        }
        Ok(())
    }

    pub fn remove_class(&self, node: NodeId, class: &str) -> DomResult<()> {
        let mut tree = self.write();
        let attrs = &mut tree.get_mut(node)?.attributes;
        if let Some(current) = attrs.get("class") {
            let updated: Vec<&str> = current
                .split_ascii_whitespace()
                .filter(|c| *c != class)
                .collect();
            let updated = updated.join(" ");
            attrs.insert("class".to_string(), updated);
        }
        Ok(())
    }

    // ==================== Tree ====================

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.read().get(node).ok().and_then(|e| e.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.read()
            .get(node)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.read().is_connected(node)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` under `parent` before `reference` (or last when `None`),
    /// moving it out of its current parent first.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        let (removed_from, connected) = {
            let mut tree = self.write();
            tree.get(parent)?;
            tree.get(child)?;
            if tree.is_inclusive_ancestor(child, parent) {
                return Err(DomError::HierarchyRequest(child, parent));
            }
            if let Some(reference) = reference {
                if tree.get(reference)?.parent != Some(parent) {
                    return Err(DomError::NotAChild(reference, parent));
                }
            }

            let old_parent = tree.detach(child)?;
            let removed_from = old_parent.filter(|p| tree.is_connected(*p));

            let children = &mut tree.get_mut(parent)?.children;
            let index = reference
                .and_then(|r| children.iter().position(|c| *c == r))
                .unwrap_or(children.len());
            children.insert(index, child);
            tree.get_mut(child)?.parent = Some(parent);

            (removed_from, tree.is_connected(parent))
        };

        if let Some(old_parent) = removed_from {
            self.notify(Mutation::ChildRemoved {
                parent: old_parent,
                child,
            });
        }
        if connected {
            self.notify(Mutation::ChildAdded { parent, child });
        }
        Ok(())
    }

    /// Detach `node` from its parent.
    pub fn remove(&self, node: NodeId) -> DomResult<()> {
        let removed = {
            let mut tree = self.write();
            match tree.detach(node)? {
                Some(parent) if tree.is_connected(parent) => Some(parent),
                _ => None,
            }
        };
        if let Some(parent) = removed {
            self.notify(Mutation::ChildRemoved {
                parent,
                child: node,
            });
        }
        Ok(())
    }

    // ==================== Queries ====================

    /// All descendants of `scope` matching `selector`, in document order.
    pub fn query_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let tree = self.read();
        tree.descendants(scope)
            .into_iter()
            .filter(|id| {
                tree.get(*id)
                    .map_or(false, |e| selector.matches(&e.tag, &e.attributes))
            })
            .collect()
    }

    /// First descendant of `scope` matching `selector`.
    pub fn query(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        let tree = self.read();
        tree.descendants(scope).into_iter().find(|id| {
            tree.get(*id)
                .map_or(false, |e| selector.matches(&e.tag, &e.attributes))
        })
    }

    /// Nearest inclusive ancestor of `node` matching `selector`.
    pub fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        let tree = self.read();
        let mut current = Some(node);
        while let Some(id) = current {
            let element = tree.get(id).ok()?;
            if selector.matches(&element.tag, &element.attributes) {
                return Some(id);
            }
            current = element.parent;
        }
        None
    }

    // ==================== Events ====================

    pub fn add_click_listener(&self, node: NodeId, listener: ClickListener) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(node)
            .or_default()
            .push(listener);
    }

    /// Drop every click listener registered on `node`.
    pub fn remove_click_listeners(&self, node: NodeId) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&node);
    }

    /// Dispatch a click at `target`, bubbling to the root unless a listener
    /// stops propagation. Listeners run without any document lock held.
    pub fn dispatch_click(&self, target: NodeId) -> ClickEvent {
        let path: Vec<NodeId> = {
            let tree = self.read();
            let mut path = Vec::new();
            let mut current = Some(target);
            while let Some(id) = current {
                path.push(id);
                current = tree.get(id).ok().and_then(|e| e.parent);
            }
            path
        };

        let mut event = ClickEvent {
            target,
            current_target: target,
            default_prevented: false,
            propagation_stopped: false,
        };

        for node in path {
            let listeners: Vec<ClickListener> = self
                .listeners
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&node)
                .cloned()
                .unwrap_or_default();

            event.current_target = node;
            for listener in listeners {
                listener(&mut event);
            }
            if event.propagation_stopped {
                break;
            }
        }

        event
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageSource for Document {
    fn language(&self) -> Option<String> {
        self.attribute(self.root(), "lang")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_insert_before_orders_children() {
        let doc = Document::new();
        let group = doc.create_element("div");
        doc.append_child(doc.body(), group).unwrap();
        let a = doc.create_element("button");
        let b = doc.create_element("button");
        doc.append_child(group, a).unwrap();
        doc.append_child(group, b).unwrap();

        let inserted = doc.create_element("button");
        doc.insert_before(group, inserted, Some(b)).unwrap();
        assert_eq!(doc.children(group), vec![a, inserted, b]);
    }

    #[test]
    fn test_insert_before_rejects_foreign_reference() {
        let doc = Document::new();
        let group = doc.create_element("div");
        let stray = doc.create_element("span");
        let child = doc.create_element("button");
        assert_eq!(
            doc.insert_before(group, child, Some(stray)),
            Err(DomError::NotAChild(stray, group))
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner).unwrap();
        assert!(matches!(
            doc.append_child(inner, outer),
            Err(DomError::HierarchyRequest(_, _))
        ));
    }

    #[tokio::test]
    async fn test_mutations_only_for_connected_tree() {
        let doc = Document::new();
        let mut rx = doc.subscribe();

        let card = doc.create_element("article");
        let link = doc.create_element("a");
        doc.append_child(card, link).unwrap();
        doc.append_child(doc.body(), card).unwrap();
        doc.remove(card).unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            Mutation::ChildAdded {
                parent: doc.body(),
                child: card
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            Mutation::ChildRemoved {
                parent: doc.body(),
                child: card
            }
        );
        assert!(rx.try_recv().is_err());
        assert!(!doc.is_connected(link));
    }

    #[test]
    fn test_query_is_scoped_and_ordered() {
        let doc = Document::new();
        let card = doc.create_element("article");
        let first = doc.create_element("a");
        let nested = doc.create_element("div");
        let second = doc.create_element("a");
        doc.append_child(doc.body(), card).unwrap();
        doc.append_child(card, first).unwrap();
        doc.append_child(card, nested).unwrap();
        doc.append_child(nested, second).unwrap();
        let outside = doc.create_element("a");
        doc.append_child(doc.body(), outside).unwrap();

        assert_eq!(doc.query_all(card, &Selector::tag("a")), vec![first, second]);
        assert_eq!(doc.closest(second, &Selector::tag("article")), Some(card));
        assert_eq!(doc.closest(outside, &Selector::tag("article")), None);
    }

    #[test]
    fn test_class_list_edits() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.set_attribute(button, "class", "css-1 r-2").unwrap();
        doc.add_class(button, "loading").unwrap();
        doc.add_class(button, "loading").unwrap();
        assert_eq!(doc.attribute(button, "class").as_deref(), Some("css-1 r-2 loading"));
        doc.remove_class(button, "r-2").unwrap();
        assert!(doc.has_class(button, "loading"));
        assert!(!doc.has_class(button, "r-2"));
    }

    #[test]
    fn test_click_bubbles_until_stopped() {
        let doc = Document::new();
        let card = doc.create_element("article");
        let button = doc.create_element("button");
        doc.append_child(doc.body(), card).unwrap();
        doc.append_child(card, button).unwrap();

        let card_clicks = Arc::new(AtomicUsize::new(0));
        let counter = card_clicks.clone();
        doc.add_click_listener(
            card,
            Arc::new(move |_: &mut ClickEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        doc.dispatch_click(button);
        assert_eq!(card_clicks.load(Ordering::SeqCst), 1);

        doc.add_click_listener(
            button,
            Arc::new(|event: &mut ClickEvent| {
                event.prevent_default();
                event.stop_propagation();
            }),
        );
        let event = doc.dispatch_click(button);
        assert!(event.default_prevented());
        assert_eq!(event.target, button);
        assert_eq!(event.current_target, button);
        assert_eq!(card_clicks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_removed_listeners_no_longer_fire() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.append_child(doc.body(), button).unwrap();

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = seen.clone();
        doc.add_click_listener(
            doc.body(),
            Arc::new(move |event: &mut ClickEvent| {
                log.lock().unwrap().push((event.target, event.current_target));
            }),
        );
        let clicks = Arc::new(AtomicUsize::new(0));
        let counter = clicks.clone();
        doc.add_click_listener(
            button,
            Arc::new(move |_: &mut ClickEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        doc.dispatch_click(button);
        doc.remove_click_listeners(button);
        doc.dispatch_click(button);

        assert_eq!(clicks.load(Ordering::SeqCst), 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(button, doc.body()), (button, doc.body())]
        );
    }

    #[tokio::test]
    async fn test_wait_ready() {
        let doc = Arc::new(Document::new());
        assert_eq!(doc.ready_state(), ReadyState::Loading);

        let waiter = {
            let doc = doc.clone();
            tokio::spawn(async move { doc.wait_ready().await })
        };
        doc.set_ready_state(ReadyState::Interactive);
        waiter.await.unwrap();
        assert_eq!(doc.language(), None);
    }
}
