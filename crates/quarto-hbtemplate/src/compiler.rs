/*
 * compiler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Code generation: AST → [`Program`].
//!
//! The compiler walks the normalized AST and emits one executable unit per
//! block scope. A frame is started for the root (named `render`) and for
//! every nested block/partial body (`block_<n>`, numbered in encounter
//! order); finishing a frame registers its ops under its reserved id.
//! Adjacent text tokens merge into a single `Append`.

use crate::ast::{Arg, BlockNode, Node, PartialNode};
use crate::program::{BlockFn, IterateKeyword, Op, Program, FORMAT_VERSION};

/// Compile a normalized AST into a program.
pub fn compile(nodes: &[Node]) -> Program {
    let mut compiler = Compiler {
        blocks: Vec::new(),
        counter: 0,
    };
    let entry = compiler.start("render".to_string(), nodes);
    Program {
        format: FORMAT_VERSION,
        entry,
        blocks: compiler.blocks,
    }
}

struct Compiler {
    blocks: Vec<BlockFn>,
    counter: usize,
}

impl Compiler {
    /// Push a frame, lower its body, and register the finished unit under
    /// the id reserved when the frame was pushed.
    fn start(&mut self, name: String, nodes: &[Node]) -> usize {
        let id = self.blocks.len();
        self.blocks.push(BlockFn {
            name,
            ops: Vec::new(),
        });
        let ops = self.lower_nodes(nodes);
        self.blocks[id].ops = ops;
        id
    }

    fn next_block_name(&mut self) -> String {
        self.counter += 1;
        format!("block_{}", self.counter)
    }

    fn lower_nodes(&mut self, nodes: &[Node]) -> Vec<Op> {
        let mut ops = Vec::new();
        let mut text = String::new();
        for node in nodes {
            match node {
                Node::Text(s) | Node::Whitespace(s) | Node::Newline(s) => text.push_str(s),
                Node::Comment(_) => {}
                Node::Expand(expr) => {
                    flush_text(&mut text, &mut ops);
                    ops.push(Op::Expand {
                        expr: expr.clone(),
                        escape: false,
                    });
                }
                Node::EscapedExpand(expr) => {
                    flush_text(&mut text, &mut ops);
                    ops.push(Op::Expand {
                        expr: expr.clone(),
                        escape: true,
                    });
                }
                Node::Block(block) => {
                    flush_text(&mut text, &mut ops);
                    let op = self.lower_block(block, false);
                    ops.push(op);
                }
                Node::InvertedBlock(block) => {
                    flush_text(&mut text, &mut ops);
                    let op = self.lower_block(block, true);
                    ops.push(op);
                }
                Node::Partial(partial) => {
                    flush_text(&mut text, &mut ops);
                    ops.push(lower_partial(partial));
                }
            }
        }
        flush_text(&mut text, &mut ops);
        ops
    }

    fn lower_block(&mut self, block: &BlockNode, inverted: bool) -> Op {
        let fn_name = self.next_block_name();
        let fn_block = self.start(fn_name, &block.body);
        let inverse = block.alt.as_ref().map(|alt| {
            let name = self.next_block_name();
            self.start(name, alt)
        });

        // each/foreach with a path-bound collection resolve the path once
        // and go straight to the iteration helper.
        if !inverted && (block.name == "each" || block.name == "foreach") {
            if let Some(Arg::Path(collection)) = block.args.first() {
                let keyword = if block.name == "each" {
                    IterateKeyword::Each
                } else {
                    IterateKeyword::Foreach
                };
                let bound = collection
                    .simple_name()
                    .map(str::to_string)
                    .unwrap_or_default();
                let columns = block
                    .kwargs
                    .iter()
                    .find(|(key, _)| key == "columns")
                    .map(|(_, value)| value.clone());
                return Op::Iterate {
                    keyword,
                    path: collection.clone(),
                    bound,
                    columns,
                    fn_block,
                    inverse,
                };
            }
        }

        Op::Invoke {
            name: block.name.clone(),
            path: block.path.clone(),
            args: block.args.clone(),
            kwargs: block.kwargs.clone(),
            fn_block,
            inverse,
            inverted,
        }
    }
}

fn lower_partial(partial: &PartialNode) -> Op {
    Op::Partial {
        name: partial.name.clone(),
        arg: partial.arg.clone(),
        kwargs: partial.kwargs.clone(),
    }
}

fn flush_text(text: &mut String, ops: &mut Vec<Op>) {
    if !text.is_empty() {
        ops.push(Op::Append(std::mem::take(text)));
    }
}
