//! Random sequences of page loads, writes and confirmations against one tree.

use crate::comment::{Author, Comment, CommentRecord, Identity, ProvisionalId};
use crate::ident::IdGenerator;
use crate::reconcile::CommentDraft;
use crate::testing::{self, assert_unique_identities, record};
use crate::tree::{CommentTree, NodeKey};
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    /// Server page of `(id, parent slot)` entries. A slot picks an earlier
    /// entry of the same page as the parent.
    Page {
        replace: bool,
        entries: Vec<(i64, Option<Index>)>,
    },
    /// Local write, under a node picked from the current tree or at the top.
    Create { parent: Option<Index> },
    /// Server answer for one of the writes issued so far.
    Confirm { pending: Index, id: i64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (
            any::<bool>(),
            prop::collection::vec((1i64..=12, any::<Option<Index>>()), 0..6),
        )
            .prop_map(|(replace, entries)| Op::Page { replace, entries }),
        any::<Option<Index>>().prop_map(|parent| Op::Create { parent }),
        (any::<Index>(), 1i64..=12).prop_map(|(pending, id)| Op::Confirm { pending, id }),
    ]
}

fn page(entries: &[(i64, Option<Index>)]) -> Vec<CommentRecord> {
    let mut seen = HashSet::new();
    let mut flat: Vec<(i64, Option<usize>)> = Vec::new();
    for (id, slot) in entries {
        if !seen.insert(*id) {
            continue;
        }
        let parent = match slot {
            Some(slot) if !flat.is_empty() => Some(slot.index(flat.len())),
            _ => None,
        };
        flat.push((*id, parent));
    }
    (0..flat.len())
        .filter(|&i| flat[i].1.is_none())
        .map(|i| nest(&flat, i))
        .collect()
}

fn nest(flat: &[(i64, Option<usize>)], at: usize) -> CommentRecord {
    let replies = (0..flat.len())
        .filter(|&i| flat[i].1 == Some(at))
        .map(|i| nest(flat, i))
        .collect();
    record(flat[at].0, "page", replies)
}

fn apply(tree: &mut CommentTree, ids: &IdGenerator, issued: &mut Vec<ProvisionalId>, op: Op) {
    match op {
        Op::Page { replace, entries } => {
            let keys = tree.ingest_records(page(&entries), ids);
            if replace {
                tree.replace(keys);
            } else {
                tree.accumulate(keys);
            }
        }
        Op::Create { parent } => {
            let nodes: Vec<NodeKey> = tree.walk_depth_first().collect();
            let parent = parent
                .filter(|_| !nodes.is_empty())
                .and_then(|slot| tree.comment(nodes[slot.index(nodes.len())]))
                .map(|c| match c.id() {
                    Some(id) => Identity::from(id),
                    None => Identity::from(&c.provisional_id),
                });
            let draft = CommentDraft::new("draft", Author::named("me"));
            let inserted = tree.insert_provisional(draft, parent.as_ref(), ids);
            issued.push(inserted.provisional_id);
        }
        Op::Confirm { pending, id } => {
            if issued.is_empty() {
                return;
            }
            let provisional = issued[pending.index(issued.len())].clone();
            let unconfirmed = tree
                .find(&Identity::from(&provisional))
                .and_then(|key| tree.comment(key))
                .is_none_or(Comment::is_pending);
            // Rejected confirmations leave the tree as it was.
            if unconfirmed {
                tree.confirm(&provisional, record(id, "draft", vec![]), ids).ok();
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_identities_stay_unique(ops in prop::collection::vec(op(), 1..40)) {
        let ids = testing::ids();
        let mut tree = CommentTree::new();
        let mut issued = Vec::new();
        for op in ops {
            apply(&mut tree, &ids, &mut issued, op);
            assert_unique_identities(&tree);

            for key in tree.walk_depth_first() {
                let comment = tree.comment(key).expect("reachable node exists");
                prop_assert_eq!(tree.find(&Identity::from(&comment.provisional_id)), Some(key));
                if let Some(id) = comment.id() {
                    prop_assert_eq!(tree.find(&Identity::from(id)), Some(key));
                }
            }
        }
    }
}
