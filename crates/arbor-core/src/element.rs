//! Declarative tree descriptions.
//!
//! An [`Element`] is an immutable value describing what a position in the
//! tree should look like. Components turn props into elements; the child
//! reconciler diffs elements against the committed work nodes.

use std::any::{type_name, Any};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::RenderError;
use crate::hooks::Hooks;
use crate::mutable_ref::NodeRef;
use crate::platform::HostHandle;

/// Stable identity of an element among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Rc<str>);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key(Rc::from(value))
    }
}

macro_rules! key_from_integer {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Key {
            fn from(value: $ty) -> Self {
                Key(Rc::from(value.to_string()))
            }
        })*
    };
}

key_from_integer!(i32, i64, u32, u64, usize);

/// Event delivered to host element handlers.
#[derive(Debug, Clone)]
pub struct Event {
    name: Rc<str>,
    target: HostHandle,
    current_target: HostHandle,
    propagation_stopped: bool,
}

impl Event {
    pub fn new(name: &str, target: HostHandle) -> Self {
        Self {
            name: Rc::from(name),
            target,
            current_target: target,
            propagation_stopped: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> HostHandle {
        self.target
    }

    /// The element whose handler is currently running.
    pub fn current_target(&self) -> HostHandle {
        self.current_target
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub(crate) fn set_current_target(&mut self, handle: HostHandle) {
        self.current_target = handle;
    }
}

/// Event callback attached to a host element attribute.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&mut Event)>);

impl EventHandler {
    pub fn new(f: impl Fn(&mut Event) + 'static) -> Self {
        EventHandler(Rc::new(f))
    }

    pub fn call(&self, event: &mut Event) {
        (self.0)(event)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler(..)")
    }
}

/// Value of a host element attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(EventHandler),
}

impl AttrValue {
    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            AttrValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(value) => write!(f, "{value:?}"),
            AttrValue::Int(value) => write!(f, "{value}"),
            AttrValue::Float(value) => write!(f, "{value}"),
            AttrValue::Bool(value) => write!(f, "{value}"),
            AttrValue::Handler(_) => f.write_str("<handler>"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(Rc::from(value))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(Rc::from(value))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(value.into())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<EventHandler> for AttrValue {
    fn from(value: EventHandler) -> Self {
        AttrValue::Handler(value)
    }
}

/// Ordered attribute list of a host element. Setting a name twice keeps the
/// last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(SmallVec<[(Rc<str>, AttrValue); 4]>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: AttrValue) {
        match self.0.iter_mut().find(|(existing, _)| &**existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((Rc::from(name), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0
            .iter()
            .find(|(existing, _)| &**existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(name, value)| (&**name, value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Description of a host element such as `ul` or `li`.
#[derive(Debug, Clone)]
pub struct HostElement {
    pub tag: Rc<str>,
    pub key: Option<Key>,
    pub attributes: Attributes,
    pub node_ref: Option<NodeRef>,
    pub children: Element,
}

impl HostElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: Rc::from(tag),
            key: None,
            attributes: Attributes::new(),
            node_ref: None,
            children: Element::Empty,
        }
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.set(name, value.into());
        self
    }

    /// Attach an event handler, e.g. `.on("onClick", ..)`.
    pub fn on(mut self, name: &str, handler: impl Fn(&mut Event) + 'static) -> Self {
        self.attributes
            .set(name, AttrValue::Handler(EventHandler::new(handler)));
        self
    }

    pub fn node_ref(mut self, node_ref: &NodeRef) -> Self {
        self.node_ref = Some(node_ref.clone());
        self
    }

    /// Replace the children with a single element.
    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.children = child.into();
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }
}

/// Shorthand for [`HostElement::new`].
pub fn host(tag: &str) -> HostElement {
    HostElement::new(tag)
}

type RenderFn = dyn Fn(&mut Hooks, &dyn Any) -> Result<Element, RenderError>;

/// A function component. Identity is the shared render function, so clones
/// of one `Component` are the same type to the reconciler.
#[derive(Clone)]
pub struct Component {
    name: &'static str,
    render: Rc<RenderFn>,
}

impl Component {
    pub fn new<P, F>(name: &'static str, f: F) -> Self
    where
        P: 'static,
        F: Fn(&mut Hooks, &P) -> Result<Element, RenderError> + 'static,
    {
        let render = move |hooks: &mut Hooks, props: &dyn Any| match props.downcast_ref::<P>() {
            Some(props) => f(hooks, props),
            None => Err(RenderError::PropsMismatch {
                component: name,
                expected: type_name::<P>(),
            }),
        };
        Self {
            name,
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.render, &other.render)
    }

    /// Describe an instance of this component.
    pub fn element<P: 'static>(&self, props: P) -> Element {
        Element::Component(Rc::new(ComponentElement {
            component: self.clone(),
            key: None,
            props: Rc::new(props),
        }))
    }

    pub fn keyed<P: 'static>(&self, key: impl Into<Key>, props: P) -> Element {
        Element::Component(Rc::new(ComponentElement {
            component: self.clone(),
            key: Some(key.into()),
            props: Rc::new(props),
        }))
    }

    pub(crate) fn render(&self, hooks: &mut Hooks, props: &dyn Any) -> Result<Element, RenderError> {
        (self.render)(hooks, props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.name).finish()
    }
}

pub struct ComponentElement {
    pub component: Component,
    pub key: Option<Key>,
    pub props: Rc<dyn Any>,
}

impl fmt::Debug for ComponentElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentElement")
            .field("component", &self.component)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct FragmentElement {
    pub key: Option<Key>,
    pub children: Element,
}

/// Tree description.
#[derive(Debug, Clone, Default)]
pub enum Element {
    /// Renders nothing.
    #[default]
    Empty,
    Text(Rc<str>),
    Host(Rc<HostElement>),
    Component(Rc<ComponentElement>),
    Fragment(Rc<FragmentElement>),
    /// Ordered children. Entries are matched by key, or by position when
    /// unkeyed.
    List(Rc<[Element]>),
    /// A description variant this engine does not understand, labelled for
    /// diagnostics. Renders nothing.
    Opaque(&'static str),
}

impl Element {
    pub fn text(content: impl AsRef<str>) -> Self {
        Element::Text(Rc::from(content.as_ref()))
    }

    pub fn fragment<I>(children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        Element::Fragment(Rc::new(FragmentElement {
            key: None,
            children: children.into_iter().map(Into::into).collect(),
        }))
    }

    pub fn keyed_fragment<I>(key: impl Into<Key>, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        Element::Fragment(Rc::new(FragmentElement {
            key: Some(key.into()),
            children: children.into_iter().map(Into::into).collect(),
        }))
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            Element::Host(host) => host.key.as_ref(),
            Element::Component(component) => component.key.as_ref(),
            Element::Fragment(fragment) => fragment.key.as_ref(),
            _ => None,
        }
    }
}

impl From<HostElement> for Element {
    fn from(value: HostElement) -> Self {
        Element::Host(Rc::new(value))
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::Text(Rc::from(value))
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::Text(Rc::from(value))
    }
}

macro_rules! element_from_number {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Element {
            fn from(value: $ty) -> Self {
                Element::Text(Rc::from(value.to_string()))
            }
        })*
    };
}

element_from_number!(i32, i64, u32, u64, usize);

impl From<Vec<Element>> for Element {
    fn from(value: Vec<Element>) -> Self {
        Element::List(Rc::from(value))
    }
}

impl FromIterator<Element> for Element {
    fn from_iter<T: IntoIterator<Item = Element>>(iter: T) -> Self {
        Element::List(iter.into_iter().collect())
    }
}
