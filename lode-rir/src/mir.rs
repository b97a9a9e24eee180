//! Basic-block form of a function body.
//!
//! The MIR exists for deterministic re-emission and source mapping, not
//! for optimization: lowering flattens a statement list into blocks with
//! typed terminators, and re-emission walks the block graph back into the
//! same statement list. Nested statement slices inside structured
//! terminators are carried as-is.

use std::collections::HashSet;
use std::mem::discriminant;

use lode_diagnostics::Span;
use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::stmt::{MatchArm, Stmt, StmtKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mir {
    pub entry: usize,
    pub blocks: Vec<MirBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirBlock {
    pub id: usize,
    pub stmts: Vec<Stmt>,
    pub terminator: Terminator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    /// Falls off the end of the body.
    End,
    Goto(usize),
    Return {
        value: Option<Expr>,
        span: Option<Span>,
    },
    If {
        cond: Expr,
        then_stmts: Vec<Stmt>,
        else_stmts: Option<Vec<Stmt>>,
        next: Option<usize>,
        span: Option<Span>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        next: Option<usize>,
        span: Option<Span>,
    },
    Match {
        scrutinee: Expr,
        arms: Vec<MatchArm>,
        next: Option<usize>,
        span: Option<Span>,
    },
    Block {
        body: Vec<Stmt>,
        next: Option<usize>,
        span: Option<Span>,
    },
}

impl Terminator {
    fn next_mut(&mut self) -> Option<&mut Option<usize>> {
        match self {
            Terminator::If { next, .. }
            | Terminator::While { next, .. }
            | Terminator::Match { next, .. }
            | Terminator::Block { next, .. } => Some(next),
            _ => None,
        }
    }
}

/// Lower a statement list into basic blocks.
pub fn lower_body(stmts: &[Stmt]) -> Mir {
    let mut blocks = vec![MirBlock {
        id: 0,
        stmts: Vec::new(),
        terminator: Terminator::End,
    }];
    let mut cur = 0usize;

    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Let { .. }
            | StmtKind::Assign { .. }
            | StmtKind::Expr(_)
            | StmtKind::Break
            | StmtKind::Continue => {
                blocks[cur].stmts.push(stmt.clone());
            }
            StmtKind::Return(value) => {
                blocks[cur].terminator = Terminator::Return {
                    value: value.clone(),
                    span: stmt.span.clone(),
                };
                cur = alloc_block(&mut blocks);
            }
            StmtKind::If {
                cond,
                then_stmts,
                else_stmts,
            } => {
                let next = alloc_block(&mut blocks);
                blocks[cur].terminator = Terminator::If {
                    cond: cond.clone(),
                    then_stmts: then_stmts.clone(),
                    else_stmts: else_stmts.clone(),
                    next: Some(next),
                    span: stmt.span.clone(),
                };
                cur = next;
            }
            StmtKind::While { cond, body } => {
                let next = alloc_block(&mut blocks);
                blocks[cur].terminator = Terminator::While {
                    cond: cond.clone(),
                    body: body.clone(),
                    next: Some(next),
                    span: stmt.span.clone(),
                };
                cur = next;
            }
            StmtKind::Match { scrutinee, arms } => {
                let next = alloc_block(&mut blocks);
                blocks[cur].terminator = Terminator::Match {
                    scrutinee: scrutinee.clone(),
                    arms: arms.clone(),
                    next: Some(next),
                    span: stmt.span.clone(),
                };
                cur = next;
            }
            StmtKind::Block(body) => {
                let next = alloc_block(&mut blocks);
                blocks[cur].terminator = Terminator::Block {
                    body: body.clone(),
                    next: Some(next),
                    span: stmt.span.clone(),
                };
                cur = next;
            }
        }
    }

    elide_trailing_empty(&mut blocks);

    Mir { entry: 0, blocks }
}

fn alloc_block(blocks: &mut Vec<MirBlock>) -> usize {
    let id = blocks.len();
    blocks.push(MirBlock {
        id,
        stmts: Vec::new(),
        terminator: Terminator::End,
    });
    id
}

/// Drop a trailing statement-less `End` block and clear any `next`
/// pointer that referenced it.
fn elide_trailing_empty(blocks: &mut Vec<MirBlock>) {
    if blocks.len() < 2 {
        return;
    }
    let Some(last) = blocks.last() else {
        return;
    };
    if !last.stmts.is_empty() || !matches!(last.terminator, Terminator::End) {
        return;
    }
    let dead = last.id;
    blocks.pop();
    for block in blocks.iter_mut() {
        if let Some(next) = block.terminator.next_mut() {
            if *next == Some(dead) {
                *next = None;
            }
        }
    }
}

/// Re-emit a block graph as a statement list. Revisiting a block (a cycle)
/// terminates emission.
pub fn reemit_body(mir: &Mir) -> Vec<Stmt> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    let mut cur = Some(mir.entry);

    while let Some(id) = cur {
        if !visited.insert(id) {
            break;
        }
        let Some(block) = mir.blocks.iter().find(|b| b.id == id) else {
            break;
        };
        out.extend(block.stmts.iter().cloned());

        match &block.terminator {
            Terminator::End => cur = None,
            Terminator::Goto(next) => cur = Some(*next),
            Terminator::Return { value, span } => {
                out.push(Stmt {
                    kind: StmtKind::Return(value.clone()),
                    span: span.clone(),
                });
                cur = None;
            }
            Terminator::If {
                cond,
                then_stmts,
                else_stmts,
                next,
                span,
            } => {
                out.push(Stmt {
                    kind: StmtKind::If {
                        cond: cond.clone(),
                        then_stmts: then_stmts.clone(),
                        else_stmts: else_stmts.clone(),
                    },
                    span: span.clone(),
                });
                cur = *next;
            }
            Terminator::While {
                cond,
                body,
                next,
                span,
            } => {
                out.push(Stmt {
                    kind: StmtKind::While {
                        cond: cond.clone(),
                        body: body.clone(),
                    },
                    span: span.clone(),
                });
                cur = *next;
            }
            Terminator::Match {
                scrutinee,
                arms,
                next,
                span,
            } => {
                out.push(Stmt {
                    kind: StmtKind::Match {
                        scrutinee: scrutinee.clone(),
                        arms: arms.clone(),
                    },
                    span: span.clone(),
                });
                cur = *next;
            }
            Terminator::Block { body, next, span } => {
                out.push(Stmt {
                    kind: StmtKind::Block(body.clone()),
                    span: span.clone(),
                });
                cur = *next;
            }
        }
    }

    out
}

/// Copy spans from `original` onto span-less emitted statements at the
/// same position and of the same kind, recursing into nested slices.
pub fn overlay_spans(emitted: &mut [Stmt], original: &[Stmt]) {
    for (e, o) in emitted.iter_mut().zip(original.iter()) {
        if discriminant(&e.kind) != discriminant(&o.kind) {
            continue;
        }
        if e.span.is_none() {
            e.span = o.span.clone();
        }
        match (&mut e.kind, &o.kind) {
            (
                StmtKind::If {
                    then_stmts: e_then,
                    else_stmts: e_else,
                    ..
                },
                StmtKind::If {
                    then_stmts: o_then,
                    else_stmts: o_else,
                    ..
                },
            ) => {
                overlay_spans(e_then, o_then);
                if let (Some(e_else), Some(o_else)) = (e_else, o_else) {
                    overlay_spans(e_else, o_else);
                }
            }
            (StmtKind::While { body: e_body, .. }, StmtKind::While { body: o_body, .. }) => {
                overlay_spans(e_body, o_body);
            }
            (StmtKind::Match { arms: e_arms, .. }, StmtKind::Match { arms: o_arms, .. }) => {
                for (e_arm, o_arm) in e_arms.iter_mut().zip(o_arms.iter()) {
                    overlay_spans(&mut e_arm.body, &o_arm.body);
                }
            }
            (StmtKind::Block(e_body), StmtKind::Block(o_body)) => {
                overlay_spans(e_body, o_body);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinOp, Expr, ExprKind};

    fn let_stmt(name: &str) -> Stmt {
        Stmt::new(StmtKind::Let {
            name: name.to_string(),
            mutable: false,
            ty: None,
            init: Some(Expr::int("0")),
        })
    }

    fn cond() -> Expr {
        Expr::new(ExprKind::Binary {
            op: BinOp::Lt,
            left: Box::new(Expr::path("i")),
            right: Box::new(Expr::path("n")),
        })
    }

    #[test]
    fn test_flat_body_is_one_block() {
        let body = vec![let_stmt("a"), let_stmt("b")];
        let mir = lower_body(&body);
        assert_eq!(mir.blocks.len(), 1);
        assert_eq!(mir.blocks[0].stmts.len(), 2);
        assert!(matches!(mir.blocks[0].terminator, Terminator::End));
        assert_eq!(reemit_body(&mir), body);
    }

    #[test]
    fn test_return_terminates_block() {
        let body = vec![
            let_stmt("a"),
            Stmt::with_span(
                StmtKind::Return(Some(Expr::path("a"))),
                Span::new("t.ls", 10, 19),
            ),
        ];
        let mir = lower_body(&body);
        // The post-return block is empty and gets elided.
        assert_eq!(mir.blocks.len(), 1);
        assert!(matches!(
            mir.blocks[0].terminator,
            Terminator::Return { .. }
        ));
        assert_eq!(reemit_body(&mir), body);
    }

    #[test]
    fn test_structured_round_trip() {
        let body = vec![
            let_stmt("i"),
            Stmt::with_span(
                StmtKind::While {
                    cond: cond(),
                    body: vec![let_stmt("x"), Stmt::new(StmtKind::Break)],
                },
                Span::new("t.ls", 5, 40),
            ),
            Stmt::new(StmtKind::If {
                cond: cond(),
                then_stmts: vec![Stmt::new(StmtKind::Return(None))],
                else_stmts: Some(vec![let_stmt("y")]),
            }),
            Stmt::new(StmtKind::Return(None)),
        ];
        let mir = lower_body(&body);
        assert_eq!(reemit_body(&mir), body);
    }

    #[test]
    fn test_trailing_empty_block_elided_and_next_cleared() {
        let body = vec![Stmt::new(StmtKind::If {
            cond: cond(),
            then_stmts: vec![],
            else_stmts: None,
        })];
        let mir = lower_body(&body);
        assert_eq!(mir.blocks.len(), 1);
        let Terminator::If { next, .. } = &mir.blocks[0].terminator else {
            panic!("expected if terminator");
        };
        assert_eq!(*next, None);
        assert_eq!(reemit_body(&mir), body);
    }

    #[test]
    fn test_statements_between_structures_thread_through_next() {
        let body = vec![
            Stmt::new(StmtKind::Block(vec![let_stmt("a")])),
            let_stmt("b"),
            Stmt::new(StmtKind::Block(vec![let_stmt("c")])),
            let_stmt("d"),
        ];
        let mir = lower_body(&body);
        assert_eq!(mir.blocks.len(), 3);
        assert_eq!(reemit_body(&mir), body);
    }

    #[test]
    fn test_cycle_terminates_emission() {
        let mir = Mir {
            entry: 0,
            blocks: vec![MirBlock {
                id: 0,
                stmts: vec![let_stmt("a")],
                terminator: Terminator::Goto(0),
            }],
        };
        // One visit only.
        assert_eq!(reemit_body(&mir).len(), 1);
    }

    #[test]
    fn test_overlay_copies_missing_spans() {
        let original = vec![Stmt::with_span(
            StmtKind::If {
                cond: cond(),
                then_stmts: vec![Stmt::with_span(
                    StmtKind::Return(None),
                    Span::new("t.ls", 20, 27),
                )],
                else_stmts: None,
            },
            Span::new("t.ls", 0, 30),
        )];
        let mut emitted = vec![Stmt::new(StmtKind::If {
            cond: cond(),
            then_stmts: vec![Stmt::new(StmtKind::Return(None))],
            else_stmts: None,
        })];
        overlay_spans(&mut emitted, &original);
        assert_eq!(emitted, original);
    }
}
