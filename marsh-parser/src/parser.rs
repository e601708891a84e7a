//! A recursive-descent parser producing [`crate::ast::Node`] trees from command
//! lines.
//!
//! The parser never fails outright: constructs it cannot make sense of become
//! [`crate::ast::NodeKind::SyntaxError`] nodes embedded in the tree, so callers
//! can report the error with its position while the rest of the line still
//! highlights sensibly.

use crate::ast::{Node, NodeKind, Position, RedirectionMode, VariableDeclaration};

/// Parses the given text into an AST, or `None` if the text contains nothing to run.
pub fn parse(input: &str) -> Option<Node> {
    Parser::new(input).parse()
}

const BAREWORD_TERMINATORS: &str = " \t\n;&|<>()'\"$";

/// Parser state over a single input line (or script).
pub struct Parser<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Parser<'a> {
    /// Returns a new parser over the given input.
    pub const fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    /// Parses the input, yielding the root node wrapped for execution.
    pub fn parse(&mut self) -> Option<Node> {
        self.skip_whitespace_and_separators();
        if self.at_end() {
            return None;
        }

        let start = self.offset;
        let mut node = self.parse_sequence();

        self.skip_whitespace_and_separators();
        if !self.at_end() {
            let error = Node::new(
                Position::new(self.offset, self.input.len()),
                NodeKind::SyntaxError("unexpected characters".to_owned()),
            );
            self.offset = self.input.len();
            node = Node::new(
                Position::new(start, self.offset),
                NodeKind::Sequence(Box::new(node), Box::new(error)),
            );
        }

        Some(wrap_in_execute(node))
    }

    fn parse_sequence(&mut self) -> Node {
        let start = self.offset;
        let mut left = self.parse_and_or();

        self.skip_blanks();
        if self.peek() == Some('&') && self.peek_at(1) != Some('&') {
            self.advance();
            left = Node::new(
                Position::new(start, self.offset),
                NodeKind::Background(Box::new(left)),
            );
        }

        self.skip_blanks();
        match self.peek() {
            Some(';' | '\n') => {
                self.skip_whitespace_and_separators();
                if self.at_end() || self.peek() == Some(')') {
                    return left;
                }
                let right = self.parse_sequence();
                Node::new(
                    Position::new(start, self.offset),
                    NodeKind::Sequence(Box::new(left), Box::new(right)),
                )
            }
            // A background marker may directly precede the next command.
            Some(c) if c != ')' && c != '(' && c != '|' && c != '&' => {
                let right = self.parse_sequence();
                Node::new(
                    Position::new(start, self.offset),
                    NodeKind::Sequence(Box::new(left), Box::new(right)),
                )
            }
            _ => left,
        }
    }

    fn parse_and_or(&mut self) -> Node {
        let start = self.offset;
        let mut left = self.parse_pipeline();

        loop {
            self.skip_blanks();
            let is_and = match (self.peek(), self.peek_at(1)) {
                (Some('&'), Some('&')) => true,
                (Some('|'), Some('|')) => false,
                _ => break,
            };
            self.advance();
            self.advance();
            self.skip_blanks();

            let right = wrap_in_execute(self.parse_pipeline());
            let position = Position::new(start, self.offset);
            let kind = if is_and {
                NodeKind::And(Box::new(wrap_in_execute(left)), Box::new(right))
            } else {
                NodeKind::Or(Box::new(wrap_in_execute(left)), Box::new(right))
            };
            left = Node::new(position, kind);
        }

        left
    }

    fn parse_pipeline(&mut self) -> Node {
        let start = self.offset;
        let left = self.parse_command();

        self.skip_blanks();
        if self.peek() == Some('|') && self.peek_at(1) != Some('|') {
            self.advance();
            self.skip_blanks();
            let right = self.parse_pipeline();
            return Node::new(
                Position::new(start, self.offset),
                NodeKind::Pipe(Box::new(left), Box::new(right)),
            );
        }

        left
    }

    fn parse_command(&mut self) -> Node {
        self.skip_blanks();
        let start = self.offset;

        if self.peek() == Some('#') {
            let text: String = self.remaining().chars().take_while(|c| *c != '\n').collect();
            self.offset += text.len();
            return Node::new(
                Position::new(start, self.offset),
                NodeKind::Comment(text),
            );
        }

        if self.at_variable_declaration() {
            return self.parse_variable_declarations();
        }

        let mut words = vec![];
        let mut redirections = vec![];

        loop {
            self.skip_blanks();
            match self.peek() {
                None | Some(';' | '\n' | '&' | '|' | ')' | '(') => break,
                // A trailing comment ends the command.
                Some('#') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                    break;
                }
                _ => {}
            }

            if let Some(redirection) = self.parse_redirection() {
                redirections.push(redirection);
                continue;
            }

            match self.parse_word() {
                Some(word) => words.push(word),
                None => break,
            }
        }

        let end = self.offset;
        let mut node = if words.is_empty() {
            Node::new(Position::new(start, end), NodeKind::CastToList(None))
        } else {
            concatenate_into_list(words)
        };
        node = Node::new(
            Position::new(start, end),
            NodeKind::CastToCommand(Box::new(node)),
        );

        // Redirections fuse onto the command in the order they were written.
        for redirection in redirections {
            node = Node::new(
                Position::new(start, end),
                NodeKind::ListConcatenate(Box::new(node), Box::new(redirection)),
            );
        }

        node
    }

    fn at_variable_declaration(&self) -> bool {
        let rest = self.remaining();
        let name_len = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .count();
        name_len > 0
            && rest[..name_len]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && rest[name_len..].starts_with('=')
    }

    fn parse_variable_declarations(&mut self) -> Node {
        let start = self.offset;
        let mut variables = vec![];

        while self.at_variable_declaration() {
            let name_start = self.offset;
            let name: String = self
                .remaining()
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            self.offset += name.len();
            let name_node = Node::new(
                Position::new(name_start, self.offset),
                NodeKind::Bareword(name),
            );

            // Skip the '='.
            self.advance();

            let value_start = self.offset;
            let value = self.parse_word().unwrap_or_else(|| {
                Node::new(
                    Position::new(value_start, value_start),
                    NodeKind::StringLiteral(String::new()),
                )
            });

            variables.push(VariableDeclaration {
                name: name_node,
                value,
            });
            self.skip_blanks();
        }

        Node::new(
            Position::new(start, self.offset),
            NodeKind::VariableDeclarations(variables),
        )
    }

    fn parse_redirection(&mut self) -> Option<Node> {
        let start = self.offset;
        let digits: String = self
            .remaining()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        let after_digits = self.offset + digits.len();

        let direction = match self.input[after_digits..].chars().next() {
            Some(c @ ('<' | '>')) => c,
            _ => return None,
        };

        self.offset = after_digits + 1;
        let explicit_fd = digits.parse::<i32>().ok();

        if direction == '>' {
            if self.peek() == Some('>') {
                self.advance();
                return Some(self.finish_path_redirection(
                    start,
                    explicit_fd.unwrap_or(1),
                    RedirectionMode::WriteAppend,
                ));
            }

            if self.peek() == Some('&') {
                self.advance();
                return Some(self.finish_fd_redirection(start, explicit_fd.unwrap_or(1)));
            }

            return Some(self.finish_path_redirection(
                start,
                explicit_fd.unwrap_or(1),
                RedirectionMode::Write,
            ));
        }

        if self.peek() == Some('>') {
            self.advance();
            return Some(self.finish_path_redirection(
                start,
                explicit_fd.unwrap_or(0),
                RedirectionMode::ReadWrite,
            ));
        }

        Some(self.finish_path_redirection(
            start,
            explicit_fd.unwrap_or(0),
            RedirectionMode::Read,
        ))
    }

    fn finish_path_redirection(&mut self, start: usize, fd: i32, mode: RedirectionMode) -> Node {
        self.skip_blanks();
        let path = self
            .parse_word()
            .unwrap_or_else(|| self.error_node(start, "expected a path after redirection"));
        Node::new(
            Position::new(start, self.offset),
            NodeKind::PathRedirection {
                fd,
                mode,
                path: Box::new(path),
            },
        )
    }

    fn finish_fd_redirection(&mut self, start: usize, source_fd: i32) -> Node {
        if self.peek() == Some('-') {
            self.advance();
            return Node::new(
                Position::new(start, self.offset),
                NodeKind::CloseFdRedirection(source_fd),
            );
        }

        let digits: String = self
            .remaining()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if digits.is_empty() {
            return self.error_node(start, "expected a file descriptor");
        }
        self.offset += digits.len();

        Node::new(
            Position::new(start, self.offset),
            NodeKind::Fd2FdRedirection {
                source_fd,
                dest_fd: digits.parse().unwrap_or(0),
            },
        )
    }

    fn parse_word(&mut self) -> Option<Node> {
        let mut parts: Vec<Node> = vec![];
        let word_start = self.offset;

        loop {
            let part = match self.peek() {
                Some('\'') => self.parse_single_quoted(),
                Some('"') => self.parse_double_quoted(),
                Some('$') => self.parse_variable_expression(),
                Some('~') if self.offset == word_start => self.parse_tilde(),
                Some(c) if !BAREWORD_TERMINATORS.contains(c) => self.parse_bareword(),
                _ => break,
            };
            parts.push(part);
        }

        let mut iter = parts.into_iter();
        let first = iter.next()?;
        Some(iter.fold(first, |left, right| {
            let position = Position::new(left.position().start_offset, right.position().end_offset);
            Node::new(
                position,
                NodeKind::Juxtaposition(Box::new(left), Box::new(right)),
            )
        }))
    }

    fn parse_single_quoted(&mut self) -> Node {
        let start = self.offset;
        self.advance();

        let mut text = String::new();
        loop {
            match self.peek() {
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
                None => return self.error_node(start, "unterminated single-quoted string"),
            }
        }

        Node::new(
            Position::new(start, self.offset),
            NodeKind::StringLiteral(text),
        )
    }

    fn parse_double_quoted(&mut self) -> Node {
        let start = self.offset;
        self.advance();

        let mut parts: Vec<Node> = vec![];
        let mut literal = String::new();
        let mut literal_start = self.offset;

        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some(c @ ('"' | '\\' | '$')) => {
                            literal.push(c);
                            self.advance();
                        }
                        Some(c) => {
                            literal.push('\\');
                            literal.push(c);
                            self.advance();
                        }
                        None => {
                            return self.error_node(start, "unterminated double-quoted string");
                        }
                    }
                }
                Some('$') => {
                    if !literal.is_empty() {
                        parts.push(Node::new(
                            Position::new(literal_start, self.offset),
                            NodeKind::StringLiteral(std::mem::take(&mut literal)),
                        ));
                    }
                    parts.push(self.parse_variable_expression());
                    literal_start = self.offset;
                }
                Some(c) => {
                    literal.push(c);
                    self.advance();
                }
                None => return self.error_node(start, "unterminated double-quoted string"),
            }
        }

        if !literal.is_empty() {
            parts.push(Node::new(
                Position::new(literal_start, self.offset),
                NodeKind::StringLiteral(literal),
            ));
        }

        let inner = parts.into_iter().reduce(|left, right| {
            let position = Position::new(left.position().start_offset, right.position().end_offset);
            Node::new(
                position,
                NodeKind::StringPartCompose(Box::new(left), Box::new(right)),
            )
        });

        Node::new(
            Position::new(start, self.offset),
            NodeKind::DoubleQuotedString(inner.map(Box::new)),
        )
    }

    fn parse_variable_expression(&mut self) -> Node {
        let start = self.offset;
        self.advance();

        match self.peek() {
            Some('(') => {
                self.advance();
                let inner = self.parse_sequence();
                self.skip_whitespace_and_separators();
                if self.peek() != Some(')') {
                    return self.error_node(start, "expected ')' to close capture expression");
                }
                self.advance();
                Node::new(
                    Position::new(start, self.offset),
                    NodeKind::Execute {
                        command: Box::new(inner),
                        capture_stdout: true,
                    },
                )
            }
            Some('?') => {
                self.advance();
                Node::new(
                    Position::new(start, self.offset),
                    NodeKind::SpecialVariable('?'),
                )
            }
            Some('$') => {
                // A '$' applied to another variable expression re-evaluates its result;
                // a bare '$$' is the process id.
                let next = self.peek_at(1);
                if next == Some('(') || next.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    let inner = self.parse_variable_expression();
                    Node::new(
                        Position::new(start, self.offset),
                        NodeKind::DynamicEvaluate(Box::new(inner)),
                    )
                } else {
                    self.advance();
                    Node::new(
                        Position::new(start, self.offset),
                        NodeKind::SpecialVariable('$'),
                    )
                }
            }
            Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                let name: String = self
                    .remaining()
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .collect();
                self.offset += name.len();
                Node::new(
                    Position::new(start, self.offset),
                    NodeKind::SimpleVariable(name),
                )
            }
            _ => Node::new(
                Position::new(start, self.offset),
                NodeKind::Bareword("$".to_owned()),
            ),
        }
    }

    fn parse_tilde(&mut self) -> Node {
        let start = self.offset;
        self.advance();

        let username: String = self
            .remaining()
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        self.offset += username.len();

        Node::new(
            Position::new(start, self.offset),
            NodeKind::Tilde(username),
        )
    }

    fn parse_bareword(&mut self) -> Node {
        let start = self.offset;
        let mut text = String::new();
        let mut is_glob = false;

        loop {
            match self.peek() {
                Some('\\') => {
                    self.advance();
                    if let Some(c) = self.peek() {
                        text.push(c);
                        self.advance();
                    }
                }
                Some(c @ ('*' | '?')) => {
                    is_glob = true;
                    text.push(c);
                    self.advance();
                }
                Some(c) if !BAREWORD_TERMINATORS.contains(c) && c != '~' => {
                    text.push(c);
                    self.advance();
                }
                // A tilde after the start of a word is a plain character.
                Some('~') => {
                    text.push('~');
                    self.advance();
                }
                _ => break,
            }
        }

        let position = Position::new(start, self.offset);
        if is_glob {
            Node::new(position, NodeKind::Glob(text))
        } else {
            Node::new(position, NodeKind::Bareword(text))
        }
    }

    fn error_node(&self, start: usize, message: &str) -> Node {
        Node::new(
            Position::new(start, self.offset.max(start)),
            NodeKind::SyntaxError(message.to_owned()),
        )
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.remaining().chars().nth(n)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.offset += c.len_utf8();
        }
    }

    fn at_end(&self) -> bool {
        self.offset >= self.input.len()
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.advance();
        }
    }

    fn skip_whitespace_and_separators(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | ';')) {
            self.advance();
        }
    }
}

fn wrap_in_execute(node: Node) -> Node {
    if node.would_execute() {
        return node;
    }

    let position = node.position();
    Node::new(
        position,
        NodeKind::Execute {
            command: Box::new(node),
            capture_stdout: false,
        },
    )
}

fn concatenate_into_list(words: Vec<Node>) -> Node {
    let mut iter = words.into_iter().rev();
    let mut node = iter.next().unwrap();
    for element in iter {
        let position = Position::new(
            element.position().start_offset,
            node.position().end_offset,
        );
        node = Node::new(
            position,
            NodeKind::ListConcatenate(Box::new(element), Box::new(node)),
        );
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unwrap_execute(node: &Node) -> &Node {
        match node.kind() {
            NodeKind::Execute { command, .. } => command,
            _ => node,
        }
    }

    #[test]
    fn test_empty_input_produces_no_node() {
        assert!(parse("").is_none());
        assert!(parse("   \n\t").is_none());
    }

    #[test]
    fn test_toplevel_is_wrapped_for_execution() {
        let node = parse("echo hi").unwrap();
        assert!(node.would_execute());
        assert!(matches!(
            node.kind(),
            NodeKind::Execute {
                capture_stdout: false,
                ..
            }
        ));
    }

    #[test]
    fn test_simple_command_shape() {
        let node = parse("echo a b").unwrap();
        let command = unwrap_execute(&node);
        let NodeKind::CastToCommand(inner) = command.kind() else {
            panic!("expected cast to command");
        };
        let NodeKind::ListConcatenate(first, rest) = inner.kind() else {
            panic!("expected word list");
        };
        assert!(matches!(first.kind(), NodeKind::Bareword(w) if w == "echo"));
        assert!(matches!(rest.kind(), NodeKind::ListConcatenate(..)));
    }

    #[test]
    fn test_pipe_and_logical_operators() {
        let node = parse("a | b").unwrap();
        assert!(matches!(unwrap_execute(&node).kind(), NodeKind::Pipe(..)));

        let node = parse("a && b").unwrap();
        let NodeKind::And(left, right) = node.kind() else {
            panic!("expected and node");
        };
        assert!(left.would_execute());
        assert!(right.would_execute());

        let node = parse("a || b").unwrap();
        assert!(matches!(node.kind(), NodeKind::Or(..)));
    }

    #[test]
    fn test_left_associative_logical_chain() {
        let node = parse("a && b || c").unwrap();
        let NodeKind::Or(left, _) = node.kind() else {
            panic!("expected or at the root");
        };
        assert!(matches!(left.kind(), NodeKind::And(..)));
    }

    #[test]
    fn test_sequences_and_background() {
        let node = parse("a; b").unwrap();
        assert!(matches!(
            unwrap_execute(&node).kind(),
            NodeKind::Sequence(..)
        ));

        let node = parse("sleep 10 &").unwrap();
        assert!(matches!(
            unwrap_execute(&node).kind(),
            NodeKind::Background(_)
        ));
    }

    #[test]
    fn test_redirections() {
        let node = parse("echo hi > /tmp/out").unwrap();
        let NodeKind::ListConcatenate(command, redirection) = unwrap_execute(&node).kind() else {
            panic!("expected redirection fused onto command");
        };
        assert!(matches!(command.kind(), NodeKind::CastToCommand(_)));
        assert!(matches!(
            redirection.kind(),
            NodeKind::PathRedirection {
                fd: 1,
                mode: RedirectionMode::Write,
                ..
            }
        ));

        let node = parse("cmd 2>&1").unwrap();
        let NodeKind::ListConcatenate(_, redirection) = unwrap_execute(&node).kind() else {
            panic!("expected redirection fused onto command");
        };
        assert!(matches!(
            redirection.kind(),
            NodeKind::Fd2FdRedirection {
                source_fd: 2,
                dest_fd: 1
            }
        ));

        let node = parse("cmd 2>&-").unwrap();
        let NodeKind::ListConcatenate(_, redirection) = unwrap_execute(&node).kind() else {
            panic!("expected redirection fused onto command");
        };
        assert!(matches!(
            redirection.kind(),
            NodeKind::CloseFdRedirection(2)
        ));

        let node = parse("sort >> log").unwrap();
        let NodeKind::ListConcatenate(_, redirection) = unwrap_execute(&node).kind() else {
            panic!("expected redirection fused onto command");
        };
        assert!(matches!(
            redirection.kind(),
            NodeKind::PathRedirection {
                fd: 1,
                mode: RedirectionMode::WriteAppend,
                ..
            }
        ));
    }

    #[test]
    fn test_variable_declarations() {
        let node = parse("FOO=bar BAZ=quux").unwrap();
        let NodeKind::VariableDeclarations(decls) = unwrap_execute(&node).kind() else {
            panic!("expected variable declarations");
        };
        assert_eq!(decls.len(), 2);
        assert!(matches!(decls[0].name.kind(), NodeKind::Bareword(n) if n == "FOO"));
        assert!(matches!(decls[0].value.kind(), NodeKind::Bareword(v) if v == "bar"));
    }

    #[test]
    fn test_variables_and_specials() {
        let node = parse("echo $FOO $? $$").unwrap();
        let mut found_simple = false;
        let mut found_question = false;
        let mut found_pid = false;
        visit_all(&node, &mut |n| match n.kind() {
            NodeKind::SimpleVariable(name) if name == "FOO" => found_simple = true,
            NodeKind::SpecialVariable('?') => found_question = true,
            NodeKind::SpecialVariable('$') => found_pid = true,
            _ => {}
        });
        assert!(found_simple && found_question && found_pid);
    }

    #[test]
    fn test_dynamic_evaluate() {
        let node = parse("echo $$foo").unwrap();
        let mut found = false;
        visit_all(&node, &mut |n| {
            if let NodeKind::DynamicEvaluate(inner) = n.kind() {
                assert!(matches!(inner.kind(), NodeKind::SimpleVariable(name) if name == "foo"));
                found = true;
            }
        });
        assert!(found);
    }

    #[test]
    fn test_capture_expression() {
        let node = parse("echo \"$(echo hello world)\"").unwrap();
        let mut found = false;
        visit_all(&node, &mut |n| {
            if matches!(
                n.kind(),
                NodeKind::Execute {
                    capture_stdout: true,
                    ..
                }
            ) {
                found = true;
            }
        });
        assert!(found);
    }

    #[test]
    fn test_globs_and_tildes() {
        let node = parse("ls *.txt ~/docs").unwrap();
        let mut found_glob = false;
        let mut found_tilde = false;
        visit_all(&node, &mut |n| match n.kind() {
            NodeKind::Glob(text) if text == "*.txt" => found_glob = true,
            NodeKind::Tilde(user) if user.is_empty() => found_tilde = true,
            _ => {}
        });
        assert!(found_glob && found_tilde);
    }

    #[test]
    fn test_tilde_with_username_and_suffix() {
        let node = parse("ls ~root/logs").unwrap();
        let mut found = false;
        visit_all(&node, &mut |n| {
            if let NodeKind::Juxtaposition(left, right) = n.kind() {
                if matches!(left.kind(), NodeKind::Tilde(u) if u == "root")
                    && matches!(right.kind(), NodeKind::Bareword(w) if w == "/logs")
                {
                    found = true;
                }
            }
        });
        assert!(found);
    }

    #[test]
    fn test_unterminated_string_is_a_syntax_error() {
        let node = parse("echo 'oops").unwrap();
        assert!(node.is_syntax_error());
        let error = node.syntax_error_node().unwrap();
        assert!(matches!(error.kind(), NodeKind::SyntaxError(_)));
    }

    #[test]
    fn test_comments_evaluate_to_nothing() {
        let node = parse("# just a note").unwrap();
        let mut found = false;
        visit_all(&node, &mut |n| {
            if matches!(n.kind(), NodeKind::Comment(_)) {
                found = true;
            }
        });
        assert!(found);
    }

    #[test]
    fn test_positions_cover_source_ranges() {
        let input = "echo hi";
        let node = parse(input).unwrap();
        assert_eq!(node.position().start_offset, 0);
        assert!(node.position().end_offset <= input.len());

        let hit = node.hit_test_position(1);
        assert!(hit.matching_node.is_some());
        assert!(
            matches!(hit.matching_node.unwrap().kind(), NodeKind::Bareword(w) if w == "echo")
        );
    }

    fn visit_all(node: &Node, f: &mut impl FnMut(&Node)) {
        f(node);
        node.visit_children(&mut |child| visit_all(child, f));
    }
}
