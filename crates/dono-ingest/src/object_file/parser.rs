//! Structural parser for indentation-based object files
//!
//! The parser keeps a stack of open [`CompositeNode`]s. A line at depth `d`
//! first closes every open node deeper than `d`, then either opens a new node
//! or adds an attribute to the node on top of the stack. Closed nodes are
//! handed to a [`NodeHandler`] in post-order (children before parents),
//! together with a mutable borrow of the parent that is still open.
//!
//! Closing is done with the [`LineSource`] suspended so no further input is
//! pulled while handlers run.

use async_trait::async_trait;
use tracing::{debug, trace};

use super::line::{classify, Classified, LineKind};
use super::node::CompositeNode;
use super::source::LineSource;
use crate::error::{FormatError, Result};

/// Default spaces per nesting level
pub const DEFAULT_INDENT_UNIT: usize = 2;

/// Receives every node when its block closes
///
/// `parent` is the enclosing node, still open, or `None` for top-level
/// nodes. The handler owns `node` from here on. Returning an error stops
/// the parse.
#[async_trait]
pub trait NodeHandler: Send {
    async fn node_closed(&mut self, parent: Option<&mut CompositeNode>, node: CompositeNode) -> Result<()>;
}

/// Counters for one parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    pub lines: usize,
    pub nodes: usize,
}

/// Streaming object-file parser
#[derive(Debug)]
pub struct ObjectFileParser {
    indent_unit: usize,
    stack: Vec<CompositeNode>,
    summary: ParseSummary,
}

impl Default for ObjectFileParser {
    fn default() -> Self {
        Self::new(DEFAULT_INDENT_UNIT)
    }
}

impl ObjectFileParser {
    pub fn new(indent_unit: usize) -> Self {
        Self {
            indent_unit: indent_unit.max(1),
            stack: Vec::new(),
            summary: ParseSummary::default(),
        }
    }

    /// Consume `source`, emitting each node to `handler` as it closes
    pub async fn parse<H>(mut self, mut source: LineSource, handler: &mut H) -> Result<ParseSummary>
    where
        H: NodeHandler + ?Sized,
    {
        while let Some((line_no, raw)) = source.next_line().await? {
            self.summary.lines += 1;
            self.feed(&mut source, line_no, &raw, handler).await?;
        }
        self.close_to(0, &mut source, handler).await?;

        debug!(lines = self.summary.lines, nodes = self.summary.nodes, "Parse finished");
        Ok(self.summary)
    }

    async fn feed<H>(&mut self, source: &mut LineSource, line_no: usize, raw: &str, handler: &mut H) -> Result<()>
    where
        H: NodeHandler + ?Sized,
    {
        let line = classify(raw, self.indent_unit, line_no)?;
        if line.kind == LineKind::Blank {
            return Ok(());
        }

        let open = self.stack.len();
        // Roots always start in column 0
        if line.depth > open + 1 || (open == 0 && line.depth > 0) {
            return Err(FormatError::IndentJump { line: line_no, depth: line.depth, open }.into());
        }
        if line.depth < open {
            self.close_to(line.depth, source, handler).await?;
        }

        if line.depth > self.stack.len() || self.stack.is_empty() {
            // First line of a block, or a new root: only an object may start here
            let node = self.require_object(&line, line_no)?;
            self.stack.push(node);
            return Ok(());
        }

        match line.kind {
            LineKind::ObjectName(name) => self.stack.push(CompositeNode::new(name, line_no)),
            LineKind::Attribute { key, value } => match self.stack.last_mut() {
                Some(top) => top.set_attribute(key, value),
                None => {
                    return Err(FormatError::OrphanAttribute { line: line_no, key: key.to_string() }.into());
                }
            },
            LineKind::Blank => {}
        }
        Ok(())
    }

    fn require_object(&self, line: &Classified<'_>, line_no: usize) -> Result<CompositeNode> {
        match line.kind {
            LineKind::ObjectName(name) => Ok(CompositeNode::new(name, line_no)),
            LineKind::Attribute { key, .. } if self.stack.is_empty() => {
                Err(FormatError::OrphanAttribute { line: line_no, key: key.to_string() }.into())
            }
            _ => Err(FormatError::InvalidObjectName {
                line: line_no,
                name: line.content.to_string(),
            }
            .into()),
        }
    }

    /// Close open nodes until `depth` remain
    ///
    /// The source is resumed even when a handler fails.
    async fn close_to<H>(&mut self, depth: usize, source: &mut LineSource, handler: &mut H) -> Result<()>
    where
        H: NodeHandler + ?Sized,
    {
        source.suspend();
        let mut outcome = Ok(());
        while self.stack.len() > depth {
            let Some(node) = self.stack.pop() else { break };
            self.summary.nodes += 1;
            trace!(name = %node.name, line = node.line, "Closing object");
            if let Err(e) = handler.node_closed(self.stack.last_mut(), node).await {
                outcome = Err(e);
                break;
            }
        }
        source.resume();
        outcome
    }
}

/// Handler that reassembles the whole document tree
///
/// Used for inspection and diagnostics; ingestion never keeps more than the
/// open path in memory.
#[derive(Debug, Default)]
pub struct TreeCollector {
    roots: Vec<CompositeNode>,
}

impl TreeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level nodes in document order
    pub fn into_roots(self) -> Vec<CompositeNode> {
        self.roots
    }

    /// All top-level nodes under a synthetic unnamed root
    pub fn into_tree(self) -> CompositeNode {
        let mut root = CompositeNode::new("", 0);
        root.children = self.roots;
        root
    }
}

#[async_trait]
impl NodeHandler for TreeCollector {
    async fn node_closed(&mut self, parent: Option<&mut CompositeNode>, node: CompositeNode) -> Result<()> {
        match parent {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
        Ok(())
    }
}

/// Parse an in-memory document into its top-level nodes
pub async fn parse_str(text: &str, indent_unit: usize) -> Result<Vec<CompositeNode>> {
    let mut collector = TreeCollector::new();
    ObjectFileParser::new(indent_unit)
        .parse(LineSource::from_text(text), &mut collector)
        .await?;
    Ok(collector.into_roots())
}
