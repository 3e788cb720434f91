//! # Parse Arena
//!
//! Request-scoped store for the nodes a fragment parse produces. Tokens,
//! token lists and relations are kept in three vectors and addressed by
//! `TokenId` / `ListId` / `RelationId`. A token list is a singly linked chain
//! through `TokenNode::next` with head and tail handles, so appending is O(1)
//! and lists can share the token store without borrowing it.
//!
//! ## Node Budget
//!
//! Every node handed out is charged against a fixed budget. When the budget is
//! exhausted the allocation fails with `RouteError::AllocationFailure`; nodes
//! already handed out stay valid, which is what lets an aborted parse return
//! its partial relation list.
//!
//! ```text
//! tokens:    [t0]->[t1]->[t2]   [t3]   [t4]->[t5]
//!             ^head      ^tail   ^      ^head ^tail
//! lists:     L0 {head:t0, tail:t2, column:t0}
//!            L1 {head:t3, tail:t3}  L2 {head:t4, tail:t5}
//! relations: R0 {left:L0, op:=, right:L1}
//! ```
//!
//! Handles are only meaningful for the arena that issued them.

use eyre::{bail, Result};

use super::relation::{ListId, RelationExpr, RelationId, TokenId, TokenKind, TokenList, TokenNode};
use super::token::Span;
use crate::error::RouteError;
use crate::memory::{NodeKind, ParseMetrics};

#[derive(Debug)]
pub struct ParseArena<'a> {
    tokens: Vec<TokenNode<'a>>,
    lists: Vec<TokenList>,
    relations: Vec<RelationExpr>,
    limit: usize,
    metrics: &'a dyn ParseMetrics,
}

impl<'a> ParseArena<'a> {
    pub fn new(limit: usize, metrics: &'a dyn ParseMetrics) -> Self {
        Self {
            tokens: Vec::new(),
            lists: Vec::new(),
            relations: Vec::new(),
            limit,
            metrics,
        }
    }

    pub fn used(&self) -> usize {
        self.tokens.len() + self.lists.len() + self.relations.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn metrics(&self) -> &'a dyn ParseMetrics {
        self.metrics
    }

    fn charge(&self, kind: NodeKind) -> Result<()> {
        if self.used() >= self.limit {
            self.metrics.on_alloc_failure();
            bail!(RouteError::AllocationFailure { limit: self.limit });
        }
        self.metrics.on_node_alloc(kind);
        Ok(())
    }

    pub fn new_list(&mut self) -> Result<ListId> {
        self.charge(NodeKind::TokenList)?;
        let id = ListId(self.lists.len() as u32);
        self.lists.push(TokenList::default());
        Ok(id)
    }

    /// Appends a token to the tail of `list`.
    pub fn push_token(&mut self, list: ListId, kind: TokenKind<'a>, span: Span) -> Result<TokenId> {
        self.charge(NodeKind::Token)?;
        let id = TokenId(self.tokens.len() as u32);
        let is_column = kind.is_column();
        self.tokens.push(TokenNode {
            kind,
            span,
            next: None,
        });

        let list = &mut self.lists[list.0 as usize];
        match list.tail {
            Some(tail) => self.tokens[tail.0 as usize].next = Some(id),
            None => list.head = Some(id),
        }
        list.tail = Some(id);
        list.len += 1;
        if is_column && list.column.is_none() {
            list.column = Some(id);
        }
        Ok(id)
    }

    pub fn push_relation(&mut self, relation: RelationExpr) -> Result<RelationId> {
        self.charge(NodeKind::Relation)?;
        let id = RelationId(self.relations.len() as u32);
        self.relations.push(relation);
        Ok(id)
    }

    pub fn token(&self, id: TokenId) -> &TokenNode<'a> {
        &self.tokens[id.0 as usize]
    }

    pub fn list(&self, id: ListId) -> &TokenList {
        &self.lists[id.0 as usize]
    }

    pub fn relation(&self, id: RelationId) -> &RelationExpr {
        &self.relations[id.0 as usize]
    }

    pub fn iter_list(&self, id: ListId) -> ListIter<'_, 'a> {
        ListIter {
            arena: self,
            next: self.list(id).head,
        }
    }

    /// The only token of `list`, if it holds exactly one.
    pub fn single_token(&self, id: ListId) -> Option<&TokenNode<'a>> {
        let list = self.list(id);
        if list.len != 1 {
            return None;
        }
        list.head.map(|head| self.token(head))
    }
}

pub struct ListIter<'r, 'a> {
    arena: &'r ParseArena<'a>,
    next: Option<TokenId>,
}

impl<'r, 'a> Iterator for ListIter<'r, 'a> {
    type Item = &'r TokenNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.arena.token(id);
        self.next = node.next;
        Some(node)
    }
}
