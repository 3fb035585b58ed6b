//! Property-based tests for the node manager leaf array.
//!
//! After any sequence of transactions the leaf array must hold exactly the
//! rows added and not removed since, without duplicates, and every row's
//! source index must equal its position.

use proptest::prelude::*;
use rowflow_core::{field_id_fn, ChangeSet, Record, RecordRef};
use rowflow_store::{NodeManager, Transaction};
use std::collections::HashSet;

#[derive(Clone, Debug)]
enum Op {
    Add { count: usize, index: Option<i64> },
    Remove { picks: Vec<usize> },
    Update { picks: Vec<usize> },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..4, prop::option::of(-2i64..12)).prop_map(|(count, index)| Op::Add { count, index }),
        prop::collection::vec(0usize..16, 1..4).prop_map(|picks| Op::Remove { picks }),
        prop::collection::vec(0usize..16, 1..4).prop_map(|picks| Op::Update { picks }),
    ]
}

fn record(id: i64, version: i64) -> RecordRef {
    Record::new().with("id", id).with("version", version).into_ref()
}

fn leaf_ids(manager: &NodeManager) -> Vec<String> {
    manager
        .tree()
        .leaves()
        .iter()
        .map(|&h| manager.tree()[h].id.clone())
        .collect()
}

proptest! {
    #[test]
    fn prop_leaf_array_matches_model(
        initial in 0usize..8,
        ops in prop::collection::vec(op_strategy(), 0..24),
    ) {
        let mut manager = NodeManager::new().with_id_fn(field_id_fn("id"));
        let mut next_id = 0i64;
        let mut model: Vec<i64> = Vec::new();

        let records: Vec<RecordRef> = (0..initial)
            .map(|_| {
                next_id += 1;
                model.push(next_id);
                record(next_id, 0)
            })
            .collect();
        manager.replace_all(records);

        let mut changes = ChangeSet::new();
        for (step, op) in ops.into_iter().enumerate() {
            match op {
                Op::Add { count, index } => {
                    let ids: Vec<i64> = (0..count).map(|_| { next_id += 1; next_id }).collect();
                    let mut tx = Transaction::new().add(ids.iter().map(|&id| record(id, 0)));
                    let at = match index {
                        Some(index) => {
                            tx = tx.add_at(index);
                            index.clamp(0, model.len() as i64) as usize
                        }
                        None => model.len(),
                    };
                    manager.apply_transaction(&tx, &mut changes);
                    model.splice(at..at, ids);
                }
                Op::Remove { picks } => {
                    if model.is_empty() {
                        continue;
                    }
                    let victims: HashSet<i64> = picks.iter().map(|p| model[p % model.len()]).collect();
                    let tx = Transaction::new().remove(victims.iter().map(|&id| record(id, 0)));
                    let result = manager.apply_transaction(&tx, &mut changes);
                    prop_assert_eq!(result.remove.len(), victims.len());
                    model.retain(|id| !victims.contains(id));
                }
                Op::Update { picks } => {
                    if model.is_empty() {
                        continue;
                    }
                    let targets: Vec<i64> = picks.iter().map(|p| model[p % model.len()]).collect();
                    let tx = Transaction::new().update(targets.iter().map(|&id| record(id, step as i64)));
                    manager.apply_transaction(&tx, &mut changes);
                }
            }

            let expected: Vec<String> = model.iter().map(|id| id.to_string()).collect();
            prop_assert_eq!(leaf_ids(&manager), expected);

            let unique: HashSet<_> = manager.tree().leaves().iter().collect();
            prop_assert_eq!(unique.len(), manager.leaf_count());

            for (i, &h) in manager.tree().leaves().iter().enumerate() {
                prop_assert_eq!(manager.tree()[h].source_row_index, Some(i));
            }
        }
    }
}
