/// Crate-wide result alias.
pub type ArborResult<T> = Result<T, ArborError>;

#[derive(thiserror::Error, Debug)]
pub enum ArborError {
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ArborError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Per-node resolution failures. All of these are recoverable: the resolver
/// degrades the offending subtree to a placeholder or a default and records a
/// [`Diagnostic`] instead of propagating.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("recursion depth {0} exceeded")]
    DepthExceeded(usize),

    #[error("referenced node \"{0}\" not found")]
    MissingNode(String),

    #[error("no variant of \"{0}\" matches the active selection")]
    UnresolvedVariant(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// The oracle rejected a subtree (malformed constraints). That subtree
    /// collapses to zero size; the rest of the tree is unaffected.
    #[error("layout oracle failure: {0}")]
    OracleFailure(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The "from" and "to" trees belong to different documents. Fatal for
    /// building that transition; callers fall back to an unanimated cut.
    #[error("cannot transition between documents \"{from}\" and \"{to}\"")]
    MismatchedRoot { from: String, to: String },
}

/// One recoverable failure attributed to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Display form of the node identity the failure is attributed to, when
    /// there is one.
    pub node: Option<String>,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    DepthExceeded,
    MissingNode,
    UnresolvedVariant,
    OracleFailure,
    MismatchedRoot,
}

/// Pass-scoped sink of recoverable failures.
///
/// Diagnostics are collected, not thrown, so a host can batch-report them
/// without interrupting rendering. Every push is mirrored to `tracing`.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Option<String>, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(node = node.as_deref().unwrap_or("<root>"), ?kind, %message, "recoverable failure");
        self.items.push(Diagnostic {
            node,
            kind,
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Hand the collected diagnostics to the host and reset the sink.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.items)
    }

    /// Move everything out of `other` into this sink (already traced at the
    /// original push site).
    pub fn append(&mut self, other: &mut Diagnostics) {
        self.items.append(&mut other.items);
    }
}
