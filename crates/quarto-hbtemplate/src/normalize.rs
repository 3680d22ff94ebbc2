/*
 * normalize.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Whitespace normalization.
//!
//! A pure AST→AST pass that deletes the incidental indentation and line
//! endings around block tags that sit alone on a line, so block structure
//! does not leak blank lines into output. A tag's own line disappears: its
//! leading whitespace and its trailing newline are removed; the newline
//! that terminates the *previous* line always survives.
//!
//! Trim decisions for one sibling list are made against the pristine layout
//! and then applied, so consecutive standalone blocks sharing a single
//! separating newline delete it exactly once. Tokens with non-whitespace
//! siblings on the same line are never touched.

use crate::ast::{BlockNode, Node};

/// Normalize a template in place, recursing into block bodies.
pub fn normalize(nodes: &mut Vec<Node>) {
    let decisions: Vec<Option<Trim>> = (0..nodes.len())
        .map(|i| decide_trims(nodes, i))
        .collect();

    let mut remove = vec![false; nodes.len()];
    for (i, decision) in decisions.iter().enumerate() {
        let Some(trim) = decision else { continue };

        if trim.open {
            if i > 0 && nodes[i - 1].is_whitespace() {
                remove[i - 1] = true;
            }
            if let Some(block) = block_mut(&mut nodes[i]) {
                if block.body.first().is_some_and(Node::is_whitespace) {
                    block.body.remove(0);
                }
                if block.body.first().is_some_and(Node::is_newline) {
                    block.body.remove(0);
                }
            }
        }

        if trim.close {
            if let Some(block) = block_mut(&mut nodes[i]) {
                let tail = block.alt.as_mut().unwrap_or(&mut block.body);
                if tail.last().is_some_and(Node::is_whitespace) {
                    tail.pop();
                }
            }
            if i + 1 < nodes.len() && nodes[i + 1].is_newline() {
                remove[i + 1] = true;
            }
        }
    }

    for node in nodes.iter_mut() {
        if let Some(block) = block_mut(node) {
            normalize(&mut block.body);
            if let Some(alt) = &mut block.alt {
                normalize(alt);
            }
        }
    }

    let mut index = 0;
    nodes.retain(|_| {
        let keep = !remove[index];
        index += 1;
        keep
    });
}

struct Trim {
    open: bool,
    close: bool,
}

fn block_mut(node: &mut Node) -> Option<&mut BlockNode> {
    match node {
        Node::Block(block) | Node::InvertedBlock(block) => Some(block),
        _ => None,
    }
}

fn block_ref(node: &Node) -> Option<&BlockNode> {
    match node {
        Node::Block(block) | Node::InvertedBlock(block) => Some(block),
        _ => None,
    }
}

fn decide_trims(nodes: &[Node], i: usize) -> Option<Trim> {
    let block = block_ref(&nodes[i])?;

    // Open tag alone at the start of a line: preceded by a newline or the
    // template start, skipping at most one pure-whitespace token, with the
    // body beginning on a fresh line.
    let line_start = i == 0
        || nodes[i - 1].is_newline()
        || (nodes[i - 1].is_whitespace() && (i == 1 || nodes[i - 2].is_newline()));
    let body_opens_clean = match block.body.first() {
        Some(first) if first.is_newline() => true,
        Some(first) if first.is_whitespace() => {
            block.body.get(1).is_some_and(Node::is_newline)
        }
        _ => false,
    };
    let open = line_start && body_opens_clean;

    // Close tag alone on its line: the last body ends with a newline plus
    // at most the close tag's indentation, and the block is followed by a
    // newline or nothing.
    let tail = block.alt.as_ref().unwrap_or(&block.body);
    let tail_ends_clean = match tail.last() {
        Some(last) if last.is_newline() => true,
        Some(last) if last.is_whitespace() => {
            tail.len() >= 2 && tail[tail.len() - 2].is_newline()
        }
        _ => false,
    };
    let after_clean = i + 1 == nodes.len() || nodes[i + 1].is_newline();
    let close = tail_ends_clean && after_clean;

    Some(Trim { open, close })
}
