//! Aggregation stage.

use crate::stage::{Stage, StageContext, Step};
use rowflow_core::{Record, RecordRef, RowEventKind, RowHandle, RowTree, Value};
use std::fmt;
use std::rc::Rc;

/// Computes a group's aggregated values.
///
/// Receives the value records of the group's filtered children: payloads for
/// data rows, aggregated records for nested groups.
pub type AggregateFn = Rc<dyn Fn(&[RecordRef]) -> Record>;

/// Fills `agg_data` on every group, children first.
///
/// The aggregated record starts from the group's own fields, so group keys
/// and tree-data parent values stay visible to sorting.
#[derive(Clone, Default)]
pub struct AggregateStage {
    aggregator: Option<AggregateFn>,
}

impl fmt::Debug for AggregateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateStage")
            .field("active", &self.aggregator.is_some())
            .finish()
    }
}

impl AggregateStage {
    pub fn new(aggregator: Option<AggregateFn>) -> Self {
        Self { aggregator }
    }

    fn aggregate_node(&self, tree: &mut RowTree, node: RowHandle) {
        let entity = &tree[node];
        if !entity.group {
            return;
        }
        let Some(aggregator) = &self.aggregator else {
            if entity.agg_data.is_some() {
                tree[node].agg_data = None;
                tree.push_event(node, RowEventKind::DataChanged);
            }
            return;
        };

        let values: Vec<RecordRef> = entity
            .children_after_filter
            .iter()
            .filter_map(|&child| tree[child].value_source().cloned())
            .collect();
        let mut agg = entity.data.as_deref().cloned().unwrap_or_default();
        for (name, value) in aggregator(&values).fields() {
            agg.set(name, value.clone());
        }

        if entity.agg_data.as_deref() == Some(&agg) {
            return;
        }
        tree[node].agg_data = Some(agg.into_ref());
        tree.push_event(node, RowEventKind::DataChanged);
    }
}

impl Stage for AggregateStage {
    fn step(&self) -> Step {
        Step::Aggregate
    }

    fn refresh_props(&self) -> &[&'static str] {
        &["aggregation"]
    }

    fn execute(&mut self, ctx: &mut StageContext<'_>) {
        for node in ctx.changed_nodes() {
            self.aggregate_node(ctx.tree, node);
        }
    }
}

/// Aggregator summing numeric `fields` over the children.
pub fn sum_fields(fields: &[&str]) -> AggregateFn {
    let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
    Rc::new(move |children: &[RecordRef]| {
        let mut out = Record::new();
        for field in &fields {
            let mut int_sum = 0i64;
            let mut float_sum = 0f64;
            let mut is_float = false;
            for record in children {
                match record.get(field) {
                    Some(Value::Int64(v)) => int_sum += v,
                    Some(value) => {
                        if let Some(v) = value.as_f64() {
                            float_sum += v;
                            is_float = true;
                        }
                    }
                    None => {}
                }
            }
            if is_float {
                out.set(field.as_str(), float_sum + int_sum as f64);
            } else {
                out.set(field.as_str(), int_sum);
            }
        }
        out
    })
}
