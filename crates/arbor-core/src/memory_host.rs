//! In-memory output medium.
//!
//! `MemoryHost` keeps a plain tree of elements and text nodes, logs every
//! adapter call, and queues microtasks for the embedder to flush. It backs
//! the test harness and the demo.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::element::{AttrValue, Attributes, Event, EventHandler};
use crate::platform::{HostConfig, HostHandle, Microtask};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    Missing { handle: HostHandle },
    NotAChild { parent: HostHandle, child: HostHandle },
    NotAnElement { handle: HostHandle },
    NotText { handle: HostHandle },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Missing { handle } => write!(f, "host node {handle} missing"),
            HostError::NotAChild { parent, child } => {
                write!(f, "host node {child} is not a child of {parent}")
            }
            HostError::NotAnElement { handle } => {
                write!(f, "host node {handle} is not an element")
            }
            HostError::NotText { handle } => write!(f, "host node {handle} is not a text node"),
        }
    }
}

impl std::error::Error for HostError {}

/// Adapter call recorded by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateInstance { handle: HostHandle, tag: String },
    CreateText { handle: HostHandle, content: String },
    AppendChild { parent: HostHandle, child: HostHandle },
    InsertBefore { parent: HostHandle, child: HostHandle, before: HostHandle },
    RemoveChild { parent: HostHandle, child: HostHandle },
    UpdateText { handle: HostHandle, content: String },
    UpdateAttributes { handle: HostHandle },
}

impl HostOp {
    /// Whether the op changes where a node sits in the tree.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            HostOp::AppendChild { .. } | HostOp::InsertBefore { .. } | HostOp::RemoveChild { .. }
        )
    }
}

/// Shared queue of host microtasks.
#[derive(Clone, Default)]
pub struct MicrotaskQueue {
    tasks: Rc<RefCell<VecDeque<Microtask>>>,
}

impl MicrotaskQueue {
    pub fn push(&self, task: Microtask) {
        self.tasks.borrow_mut().push_back(task);
    }

    /// Run microtasks until the queue is empty, including ones queued while
    /// flushing. Returns how many ran.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.tasks.borrow_mut().pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("len", &self.len())
            .finish()
    }
}

enum MemoryNodeData {
    Container,
    Element { tag: Rc<str>, attributes: Attributes },
    Text(String),
}

struct MemoryNode {
    data: MemoryNodeData,
    parent: Option<HostHandle>,
    children: Vec<HostHandle>,
}

#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<MemoryNode>,
    ops: Vec<HostOp>,
    microtasks: MicrotaskQueue,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached container to render into.
    pub fn create_container(&mut self) -> HostHandle {
        self.push(MemoryNodeData::Container)
    }

    pub fn microtasks(&self) -> MicrotaskQueue {
        self.microtasks.clone()
    }

    /// Every adapter call so far, oldest first.
    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Number of host objects ever created, containers included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, handle: HostHandle) -> Result<&[HostHandle], HostError> {
        Ok(&self.node(handle)?.children)
    }

    pub fn parent(&self, handle: HostHandle) -> Result<Option<HostHandle>, HostError> {
        Ok(self.node(handle)?.parent)
    }

    pub fn tag(&self, handle: HostHandle) -> Result<&str, HostError> {
        match &self.node(handle)?.data {
            MemoryNodeData::Element { tag, .. } => Ok(tag),
            _ => Err(HostError::NotAnElement { handle }),
        }
    }

    pub fn attribute(&self, handle: HostHandle, name: &str) -> Result<Option<&AttrValue>, HostError> {
        match &self.node(handle)?.data {
            MemoryNodeData::Element { attributes, .. } => Ok(attributes.get(name)),
            _ => Err(HostError::NotAnElement { handle }),
        }
    }

    /// Concatenated text below `handle`, in document order.
    pub fn text_content(&self, handle: HostHandle) -> String {
        let mut out = String::new();
        self.collect_text(handle, &mut out);
        out
    }

    fn collect_text(&self, handle: HostHandle, out: &mut String) {
        let Ok(node) = self.node(handle) else {
            return;
        };
        if let MemoryNodeData::Text(content) = &node.data {
            out.push_str(content);
        }
        for &child in &node.children {
            self.collect_text(child, out);
        }
    }

    /// Elements with `tag` below `root`, in document order.
    pub fn find_all(&self, root: HostHandle, tag: &str) -> Vec<HostHandle> {
        let mut found = Vec::new();
        self.collect_tag(root, tag, &mut found);
        found
    }

    fn collect_tag(&self, handle: HostHandle, tag: &str, found: &mut Vec<HostHandle>) {
        let Ok(node) = self.node(handle) else {
            return;
        };
        for &child in &node.children {
            if matches!(self.tag(child), Ok(child_tag) if child_tag == tag) {
                found.push(child);
            }
            self.collect_tag(child, tag, found);
        }
    }

    /// Indented outline of the tree below `root`. Handlers are omitted.
    pub fn dump(&self, root: HostHandle) -> String {
        let mut out = String::new();
        self.dump_node(root, 0, &mut out);
        out
    }

    fn dump_node(&self, handle: HostHandle, depth: usize, out: &mut String) {
        let Ok(node) = self.node(handle) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let _ = match &node.data {
            MemoryNodeData::Container => writeln!(out, "{indent}container {handle}"),
            MemoryNodeData::Text(content) => writeln!(out, "{indent}{content:?}"),
            MemoryNodeData::Element { tag, attributes } => {
                let _ = write!(out, "{indent}<{tag}");
                for (name, value) in attributes.iter() {
                    if value.as_handler().is_none() {
                        let _ = write!(out, " {name}={value}");
                    }
                }
                writeln!(out, ">")
            }
        };
        for &child in &node.children {
            self.dump_node(child, depth + 1, out);
        }
    }

    /// Deliver `event_name` (e.g. `"click"`) at `target`.
    ///
    /// `on<Name>Capture` handlers run from the outermost ancestor inwards,
    /// then `on<Name>` handlers from the target outwards, until one stops
    /// propagation. Handlers run with the host unborrowed, so they may
    /// dispatch updates. Returns the delivered event.
    pub fn dispatch_event(host: &RefCell<MemoryHost>, target: HostHandle, event_name: &str) -> Event {
        let (capture, bubble) = host.borrow().collect_handlers(target, event_name);
        let mut event = Event::new(event_name, target);
        for (current_target, handler) in capture.iter().rev().chain(bubble.iter()) {
            event.set_current_target(*current_target);
            handler.call(&mut event);
            if event.is_propagation_stopped() {
                break;
            }
        }
        event
    }

    /// Handlers on the path from `target` up to the container, innermost
    /// first.
    fn collect_handlers(
        &self,
        target: HostHandle,
        event_name: &str,
    ) -> (Vec<(HostHandle, EventHandler)>, Vec<(HostHandle, EventHandler)>) {
        let bubble_name = handler_name(event_name);
        let capture_name = format!("{bubble_name}Capture");
        let mut capture = Vec::new();
        let mut bubble = Vec::new();
        let mut cursor = Some(target);
        while let Some(handle) = cursor {
            let Ok(node) = self.node(handle) else {
                break;
            };
            if let MemoryNodeData::Element { attributes, .. } = &node.data {
                if let Some(handler) = attributes.get(&capture_name).and_then(AttrValue::as_handler) {
                    capture.push((handle, handler.clone()));
                }
                if let Some(handler) = attributes.get(&bubble_name).and_then(AttrValue::as_handler) {
                    bubble.push((handle, handler.clone()));
                }
            }
            cursor = node.parent;
        }
        (capture, bubble)
    }

    fn push(&mut self, data: MemoryNodeData) -> HostHandle {
        let handle = HostHandle(self.nodes.len() as u64);
        self.nodes.push(MemoryNode {
            data,
            parent: None,
            children: Vec::new(),
        });
        handle
    }

    fn node(&self, handle: HostHandle) -> Result<&MemoryNode, HostError> {
        self.nodes
            .get(handle.0 as usize)
            .ok_or(HostError::Missing { handle })
    }

    fn node_mut(&mut self, handle: HostHandle) -> Result<&mut MemoryNode, HostError> {
        self.nodes
            .get_mut(handle.0 as usize)
            .ok_or(HostError::Missing { handle })
    }

    fn detach(&mut self, child: HostHandle) -> Result<(), HostError> {
        if let Some(parent) = self.node(child)?.parent {
            self.node_mut(parent)?.children.retain(|&c| c != child);
            self.node_mut(child)?.parent = None;
        }
        Ok(())
    }

    fn try_insert(
        &mut self,
        parent: HostHandle,
        child: HostHandle,
        before: Option<HostHandle>,
    ) -> Result<(), HostError> {
        self.node(parent)?;
        self.detach(child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let position = match before {
            Some(before) => siblings
                .iter()
                .position(|&c| c == before)
                .ok_or(HostError::NotAChild {
                    parent,
                    child: before,
                })?,
            None => siblings.len(),
        };
        siblings.insert(position, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn try_remove(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        if self.node(child)?.parent != Some(parent) {
            return Err(HostError::NotAChild { parent, child });
        }
        self.detach(child)
    }

    fn try_update_text(&mut self, handle: HostHandle, content: &str) -> Result<(), HostError> {
        match &mut self.node_mut(handle)?.data {
            MemoryNodeData::Text(text) => {
                text.clear();
                text.push_str(content);
                Ok(())
            }
            _ => Err(HostError::NotText { handle }),
        }
    }

    fn try_update_attributes(&mut self, handle: HostHandle, new: &Attributes) -> Result<(), HostError> {
        match &mut self.node_mut(handle)?.data {
            MemoryNodeData::Element { attributes, .. } => {
                *attributes = new.clone();
                Ok(())
            }
            _ => Err(HostError::NotAnElement { handle }),
        }
    }
}

fn handler_name(event_name: &str) -> String {
    let mut chars = event_name.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

fn report(result: Result<(), HostError>) {
    if let Err(error) = result {
        log::warn!("memory host: {error}");
    }
}

impl HostConfig for MemoryHost {
    fn create_instance(&mut self, tag: &str, attributes: &Attributes) -> HostHandle {
        let handle = self.push(MemoryNodeData::Element {
            tag: Rc::from(tag),
            attributes: attributes.clone(),
        });
        self.ops.push(HostOp::CreateInstance {
            handle,
            tag: tag.to_string(),
        });
        handle
    }

    fn create_text_instance(&mut self, content: &str) -> HostHandle {
        let handle = self.push(MemoryNodeData::Text(content.to_string()));
        self.ops.push(HostOp::CreateText {
            handle,
            content: content.to_string(),
        });
        handle
    }

    fn append_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.ops.push(HostOp::AppendChild { parent, child });
        let result = self.try_insert(parent, child, None);
        report(result);
    }

    fn insert_before(&mut self, parent: HostHandle, child: HostHandle, before: HostHandle) {
        self.ops.push(HostOp::InsertBefore {
            parent,
            child,
            before,
        });
        let result = self.try_insert(parent, child, Some(before));
        report(result);
    }

    fn remove_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.ops.push(HostOp::RemoveChild { parent, child });
        let result = self.try_remove(parent, child);
        report(result);
    }

    fn commit_text_update(&mut self, instance: HostHandle, content: &str) {
        self.ops.push(HostOp::UpdateText {
            handle: instance,
            content: content.to_string(),
        });
        let result = self.try_update_text(instance, content);
        report(result);
    }

    fn commit_update(
        &mut self,
        instance: HostHandle,
        _tag: &str,
        _old: &Attributes,
        new: &Attributes,
    ) {
        self.ops.push(HostOp::UpdateAttributes { handle: instance });
        let result = self.try_update_attributes(instance, new);
        report(result);
    }

    fn schedule_microtask(&mut self, task: Microtask) {
        self.microtasks.push(task);
    }
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("nodes", &self.nodes.len())
            .field("ops", &self.ops.len())
            .field("microtasks", &self.microtasks.len())
            .finish()
    }
}
