//! Defines the abstract syntax tree (AST) for shell expressions. Includes types and
//! utilities for inspecting nodes: syntax-error discovery, hit-testing for the line
//! editor, and execution-shape queries used by the evaluator.

/// A half-open byte range locating a node in its source line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    /// Byte offset of the first character of the node.
    pub start_offset: usize,
    /// Byte offset one past the last character of the node.
    pub end_offset: usize,
}

impl Position {
    /// Returns a new position covering the given byte range.
    pub const fn new(start_offset: usize, end_offset: usize) -> Self {
        Self {
            start_offset,
            end_offset,
        }
    }

    /// Checks whether the given byte offset falls within this position.
    pub const fn contains(&self, offset: usize) -> bool {
        self.start_offset <= offset && offset <= self.end_offset
    }
}

/// A single syntactic construct, along with its source position.
#[derive(Clone, Debug)]
pub struct Node {
    position: Position,
    kind: NodeKind,
}

/// A variable declaration appearing in a [`NodeKind::VariableDeclarations`] node.
#[derive(Clone, Debug)]
pub struct VariableDeclaration {
    /// The node producing the variable's name.
    pub name: Node,
    /// The node producing the variable's value.
    pub value: Node,
}

/// The file descriptor rewiring modes expressible with path redirections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectionMode {
    /// Open the path for reading.
    Read,
    /// Open the path for writing, truncating it.
    Write,
    /// Open the path for reading and writing.
    ReadWrite,
    /// Open the path for writing, appending to it.
    WriteAppend,
}

/// The kinds of syntactic constructs the parser produces.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// An unquoted literal word.
    Bareword(String),
    /// A single-quoted literal.
    StringLiteral(String),
    /// A double-quoted string; the inner node (if any) produces its parts.
    DoubleQuotedString(Option<Box<Node>>),
    /// A word containing glob metacharacters.
    Glob(String),
    /// A `~` or `~user` prefix; the string holds the (possibly empty) user name.
    Tilde(String),
    /// A `$name` variable reference.
    SimpleVariable(String),
    /// A single-character special variable reference (`$?`, `$$`).
    SpecialVariable(char),
    /// Two adjacent expressions composed without separating whitespace.
    Juxtaposition(Box<Node>, Box<Node>),
    /// Two expressions composed into one string part (inside double quotes).
    StringPartCompose(Box<Node>, Box<Node>),
    /// An element prepended to a list (or fused into a command pipeline).
    ListConcatenate(Box<Node>, Box<Node>),
    /// Coerces its inner expression into a command.
    CastToCommand(Box<Node>),
    /// Coerces its inner expression (if any) into a list.
    CastToList(Option<Box<Node>>),
    /// Two expressions separated by `;` or a newline.
    Sequence(Box<Node>, Box<Node>),
    /// `left && right`.
    And(Box<Node>, Box<Node>),
    /// `left || right`.
    Or(Box<Node>, Box<Node>),
    /// `left | right`.
    Pipe(Box<Node>, Box<Node>),
    /// A command to be run without waiting for it (`... &`).
    Background(Box<Node>),
    /// The gateway to process creation; optionally captures standard output.
    Execute {
        /// The expression producing the commands to run.
        command: Box<Node>,
        /// Whether the commands' standard output is captured as a value.
        capture_stdout: bool,
    },
    /// One or more `name=value` declarations.
    VariableDeclarations(Vec<VariableDeclaration>),
    /// `$expr`: re-interprets the inner result as a variable name or argv.
    DynamicEvaluate(Box<Node>),
    /// A `#`-prefixed comment.
    Comment(String),
    /// `fd < path`, `fd > path`, `fd >> path`, or `fd <> path`.
    PathRedirection {
        /// The file descriptor being rewired.
        fd: i32,
        /// How the path should be opened.
        mode: RedirectionMode,
        /// The node producing the path.
        path: Box<Node>,
    },
    /// `fd>&-`: close a file descriptor.
    CloseFdRedirection(i32),
    /// `source>&dest`: duplicate one file descriptor onto another.
    Fd2FdRedirection {
        /// The descriptor being rewired.
        source_fd: i32,
        /// The descriptor it becomes a copy of.
        dest_fd: i32,
    },
    /// A construct the parser could not make sense of.
    SyntaxError(String),
}

/// The result of hit-testing a node tree against a byte offset.
#[derive(Default)]
pub struct HitTestResult<'a> {
    /// The most specific node containing the offset.
    pub matching_node: Option<&'a Node>,
    /// The closest enclosing node that carries meaning of its own.
    pub closest_node_with_semantic_meaning: Option<&'a Node>,
    /// The closest enclosing node that names a command.
    pub closest_command_node: Option<&'a Node>,
}

impl Node {
    /// Returns a new node with the given position and kind.
    pub const fn new(position: Position, kind: NodeKind) -> Self {
        Self { position, kind }
    }

    /// Returns the node's source position.
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Returns the node's kind.
    pub const fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Consumes the node, returning its position and kind.
    pub fn into_parts(self) -> (Position, NodeKind) {
        (self.position, self.kind)
    }

    /// Checks whether this node or any of its descendants is a syntax error.
    pub fn is_syntax_error(&self) -> bool {
        self.syntax_error_node().is_some()
    }

    /// Finds the first syntax error in this node's subtree, if there is one.
    pub fn syntax_error_node(&self) -> Option<&Self> {
        if matches!(self.kind, NodeKind::SyntaxError(_)) {
            return Some(self);
        }

        let mut found = None;
        self.visit_children(&mut |child| {
            if found.is_none() {
                found = child.syntax_error_node();
            }
        });

        found
    }

    /// Checks whether evaluating this node will spawn processes.
    pub fn would_execute(&self) -> bool {
        match &self.kind {
            NodeKind::Execute { .. } | NodeKind::And(..) | NodeKind::Or(..) => true,
            NodeKind::Sequence(left, right) => left.would_execute() || right.would_execute(),
            _ => false,
        }
    }

    /// Checks whether this node evaluates to a command (or command sequence).
    pub fn is_command(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::CastToCommand(_)
                | NodeKind::Pipe(..)
                | NodeKind::Background(_)
                | NodeKind::PathRedirection { .. }
                | NodeKind::CloseFdRedirection(_)
                | NodeKind::Fd2FdRedirection { .. }
        )
    }

    /// Checks whether this node is an unquoted literal word.
    pub const fn is_bareword(&self) -> bool {
        matches!(self.kind, NodeKind::Bareword(_))
    }

    /// Checks whether this node is a tilde expression.
    pub const fn is_tilde(&self) -> bool {
        matches!(self.kind, NodeKind::Tilde(_))
    }

    /// Finds the leftmost plain literal in this node's subtree, if the subtree is
    /// trivial enough for it to stand for the whole expression's first word.
    pub fn leftmost_trivial_literal(&self) -> Option<&Self> {
        match &self.kind {
            NodeKind::Bareword(_) => Some(self),
            NodeKind::CastToCommand(inner) | NodeKind::Execute { command: inner, .. } => {
                inner.leftmost_trivial_literal()
            }
            NodeKind::ListConcatenate(element, _) => element.leftmost_trivial_literal(),
            _ => None,
        }
    }

    /// Finds the most specific node containing the given byte offset, along with the
    /// closest enclosing nodes useful for completion.
    pub fn hit_test_position(&self, offset: usize) -> HitTestResult<'_> {
        if !self.position.contains(offset) {
            return HitTestResult::default();
        }

        match &self.kind {
            NodeKind::Bareword(_)
            | NodeKind::StringLiteral(_)
            | NodeKind::Glob(_)
            | NodeKind::Tilde(_)
            | NodeKind::SimpleVariable(_)
            | NodeKind::SpecialVariable(_) => HitTestResult {
                matching_node: Some(self),
                closest_node_with_semantic_meaning: Some(self),
                closest_command_node: None,
            },

            NodeKind::Execute { command, .. } => {
                let mut result = command.hit_test_position(offset);
                if result.closest_node_with_semantic_meaning.is_none() {
                    result.closest_node_with_semantic_meaning = Some(self);
                }
                if result.closest_command_node.is_none() {
                    result.closest_command_node = Some(command.as_ref());
                }
                result
            }

            NodeKind::CastToCommand(inner) | NodeKind::DynamicEvaluate(inner) => {
                let mut result = inner.hit_test_position(offset);
                if result.closest_node_with_semantic_meaning.is_none() {
                    result.closest_node_with_semantic_meaning = Some(self);
                }
                result
            }

            NodeKind::Juxtaposition(left, right)
            | NodeKind::ListConcatenate(left, right)
            | NodeKind::StringPartCompose(left, right)
            | NodeKind::Sequence(left, right)
            | NodeKind::And(left, right)
            | NodeKind::Or(left, right)
            | NodeKind::Pipe(left, right) => {
                let mut result = left.hit_test_position(offset);
                if result.matching_node.is_none() {
                    result = right.hit_test_position(offset);
                }
                if result.closest_node_with_semantic_meaning.is_none() {
                    result.closest_node_with_semantic_meaning = Some(self);
                }
                result
            }

            NodeKind::Background(inner)
            | NodeKind::CastToList(Some(inner))
            | NodeKind::DoubleQuotedString(Some(inner))
            | NodeKind::PathRedirection { path: inner, .. } => inner.hit_test_position(offset),

            NodeKind::VariableDeclarations(decls) => {
                for decl in decls {
                    let result = decl.value.hit_test_position(offset);
                    if result.matching_node.is_some() {
                        return result;
                    }
                }
                HitTestResult::default()
            }

            _ => HitTestResult::default(),
        }
    }

    /// Invokes the given function on each direct child of this node.
    pub fn visit_children<'a>(&'a self, f: &mut impl FnMut(&'a Self)) {
        match &self.kind {
            NodeKind::Juxtaposition(left, right)
            | NodeKind::StringPartCompose(left, right)
            | NodeKind::ListConcatenate(left, right)
            | NodeKind::Sequence(left, right)
            | NodeKind::And(left, right)
            | NodeKind::Or(left, right)
            | NodeKind::Pipe(left, right) => {
                f(left);
                f(right);
            }
            NodeKind::CastToCommand(inner)
            | NodeKind::Background(inner)
            | NodeKind::DynamicEvaluate(inner)
            | NodeKind::Execute { command: inner, .. }
            | NodeKind::PathRedirection { path: inner, .. } => f(inner),
            NodeKind::CastToList(Some(inner)) | NodeKind::DoubleQuotedString(Some(inner)) => {
                f(inner);
            }
            NodeKind::VariableDeclarations(decls) => {
                for decl in decls {
                    f(&decl.name);
                    f(&decl.value);
                }
            }
            _ => {}
        }
    }
}
