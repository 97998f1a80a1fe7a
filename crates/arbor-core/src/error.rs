use std::fmt;

/// Failure raised while a render pass evaluates the tree.
///
/// Structural errors come from misuse of the hooks API and point at a bug in
/// the component; evaluation errors are raised by component logic itself.
/// Either kind aborts the pass that produced it, and the previously committed
/// tree stays in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The component called more hooks than during its previous render.
    TooManyHooks { component: &'static str },
    /// The component called fewer hooks than during its previous render.
    TooFewHooks {
        component: &'static str,
        expected: usize,
        found: usize,
    },
    /// The hook at `index` is a different kind (or holds a different type)
    /// than the one recorded by the previous render.
    HookMismatch {
        component: &'static str,
        index: usize,
        expected: &'static str,
    },
    /// The component was handed props of a type it does not accept.
    PropsMismatch {
        component: &'static str,
        expected: &'static str,
    },
    /// Component logic failed while producing its children.
    Component {
        component: &'static str,
        message: String,
    },
}

impl RenderError {
    /// Convenience constructor for component-raised failures.
    pub fn component(component: &'static str, message: impl Into<String>) -> Self {
        RenderError::Component {
            component,
            message: message.into(),
        }
    }

    /// Returns `true` for hooks/props misuse, `false` for evaluation failures.
    pub fn is_structural(&self) -> bool {
        !matches!(self, RenderError::Component { .. })
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::TooManyHooks { component } => {
                write!(
                    f,
                    "{component} rendered more hooks than during the previous render"
                )
            }
            RenderError::TooFewHooks {
                component,
                expected,
                found,
            } => write!(
                f,
                "{component} rendered {found} hooks, previous render had {expected}"
            ),
            RenderError::HookMismatch {
                component,
                index,
                expected,
            } => write!(
                f,
                "{component}: hook #{index} changed between renders; expected {expected}"
            ),
            RenderError::PropsMismatch {
                component,
                expected,
            } => write!(f, "{component} expected props of type {expected}"),
            RenderError::Component { component, message } => {
                write!(f, "{component} failed to render: {message}")
            }
        }
    }
}

impl std::error::Error for RenderError {}
