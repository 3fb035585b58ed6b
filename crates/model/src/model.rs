//! Client-side row model.
//!
//! `RowModel` ties the node manager to the stage pipeline: every data
//! mutation is reconciled into the row tree, then the pipeline is run from
//! the earliest step the mutation affects. Subscribers are told about each
//! completed run.

use crate::batch::{BatchCallback, BatchQueue};
use crate::config::RowModelConfig;
use crate::subscription::{SubscriptionId, SubscriptionManager};
use crossbeam_channel::Receiver;
use rowflow_core::{
    ChangeSet, ChildList, Error, ModelUpdatedEvent, Record, RecordRef, Result, RowEntity, RowEvent,
    RowHandle, RowIdFn, RowTree,
};
use rowflow_pipeline::stages::{
    AggregateFn, AggregateStage, FilterAggregatesStage, FilterStage, FlattenStage, GroupStage, PivotFn, PivotStage,
    RowPredicate, SortStage,
};
use rowflow_pipeline::{PipelineOrchestrator, RefreshParams, RowHeightFn, Step};
use rowflow_sort::{RowComparator, SortOption, SortParams, ValueComparatorFn};
use rowflow_store::{record_children_fn, NestedChildrenFn, NodeManager, Transaction, TransactionResult};
use std::time::Instant;
use tracing::{debug, warn};

/// Key holding nested children in JSON datasets.
pub const JSON_CHILDREN_KEY: &str = "children";

/// Builder for `RowModel`.
#[derive(Default)]
pub struct RowModelBuilder {
    config: RowModelConfig,
    id_fn: Option<RowIdFn>,
    nested_children: Option<NestedChildrenFn>,
    comparator: RowComparator,
    filter: Option<RowPredicate>,
    aggregate_filter: Option<RowPredicate>,
    aggregator: Option<AggregateFn>,
    pivot: Option<PivotFn>,
    row_height_fn: Option<RowHeightFn>,
}

impl RowModelBuilder {
    pub fn new(config: RowModelConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn id_fn(mut self, id_fn: RowIdFn) -> Self {
        self.id_fn = Some(id_fn);
        self
    }

    /// Getter for nested children. Tree data without a getter reads
    /// `Record::children`.
    pub fn nested_children(mut self, getter: NestedChildrenFn) -> Self {
        self.nested_children = Some(getter);
        self
    }

    /// Custom comparison for one field.
    pub fn comparator(mut self, field: impl Into<String>, compare: ValueComparatorFn) -> Self {
        self.comparator = self.comparator.with_comparator(field, compare);
        self
    }

    pub fn filter(mut self, predicate: RowPredicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn aggregate_filter(mut self, predicate: RowPredicate) -> Self {
        self.aggregate_filter = Some(predicate);
        self
    }

    pub fn aggregator(mut self, aggregator: AggregateFn) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn pivot(mut self, hook: PivotFn) -> Self {
        self.pivot = Some(hook);
        self
    }

    pub fn row_height_fn(mut self, height_fn: RowHeightFn) -> Self {
        self.row_height_fn = Some(height_fn);
        self
    }

    /// Builds the model. Tree data wins over `group_by` when both are set.
    pub fn build(self) -> RowModel {
        let mut config = self.config;
        if let Err(error) = config.validate() {
            warn!(error = %error, "ignoring group_by in favour of tree data");
            config.group_by.clear();
        }

        let mut nodes = NodeManager::new().with_reconcile_order(config.reconcile_order);
        if let Some(id_fn) = self.id_fn {
            nodes = nodes.with_id_fn(id_fn);
        }
        match self.nested_children {
            Some(getter) => nodes = nodes.with_nested_children(getter),
            None if config.tree_data => nodes = nodes.with_nested_children(record_children_fn()),
            None => {}
        }

        let mut comparator = self.comparator;
        comparator.set_options(config.sort.clone());
        let sort_params = SortParams {
            comparator,
            group_columns: config.group_by.clone(),
            maintain_group_order: config.maintain_group_order,
            pivot_mode: config.pivot_mode,
            delta_sort: config.delta_sort,
        };

        let group = if config.tree_data {
            GroupStage::tree_data()
        } else if config.group_by.is_empty() {
            GroupStage::new()
        } else {
            GroupStage::by_fields(config.group_by.clone())
        };

        let mut pipeline = PipelineOrchestrator::new()
            .with_row_height(config.row_height)
            .with_stage(Box::new(group.with_default_expanded(config.group_default_expanded)))
            .with_stage(Box::new(FilterStage::new(self.filter)))
            .with_stage(Box::new(PivotStage::new(self.pivot)))
            .with_stage(Box::new(AggregateStage::new(self.aggregator)))
            .with_stage(Box::new(FilterAggregatesStage::new(self.aggregate_filter)))
            .with_stage(Box::new(SortStage::new(sort_params.clone())))
            .with_stage(Box::new(
                FlattenStage::new()
                    .with_group_footers(config.group_footers)
                    .with_grand_total_footer(config.grand_total_footer),
            ));
        if let Some(height_fn) = self.row_height_fn {
            pipeline = pipeline.with_row_height_fn(height_fn);
        }

        RowModel {
            config,
            nodes,
            pipeline,
            sort_params,
            subscriptions: SubscriptionManager::new(),
            batch: BatchQueue::new(),
            stale: false,
        }
    }
}

/// Child list followed by a node walk.
#[derive(Clone, Copy)]
enum WalkList {
    Group,
    Filter,
    Sort,
}

impl WalkList {
    fn children(self, entity: &RowEntity) -> &ChildList {
        match self {
            WalkList::Group => &entity.children_after_group,
            WalkList::Filter => &entity.children_after_filter,
            WalkList::Sort => &entity.children_after_sort,
        }
    }
}

/// The row model: data in, ordered rows to display out.
pub struct RowModel {
    config: RowModelConfig,
    nodes: NodeManager,
    pipeline: PipelineOrchestrator,
    sort_params: SortParams,
    subscriptions: SubscriptionManager,
    batch: BatchQueue,
    /// Set when an update transaction skipped the pipeline.
    stale: bool,
}

impl RowModel {
    /// Creates a model with default stages and no collaborators.
    pub fn new(config: RowModelConfig) -> Self {
        RowModelBuilder::new(config).build()
    }

    pub fn builder(config: RowModelConfig) -> RowModelBuilder {
        RowModelBuilder::new(config)
    }

    #[inline]
    pub fn config(&self) -> &RowModelConfig {
        &self.config
    }

    #[inline]
    pub fn tree(&self) -> &RowTree {
        self.nodes.tree()
    }

    /// Returns true if an update transaction skipped the pipeline and the
    /// next refresh will recompute everything.
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Replaces the dataset. Every existing row entity is dropped.
    pub fn set_full_dataset(&mut self, records: Vec<RecordRef>) -> Option<ModelUpdatedEvent> {
        self.nodes.replace_all(records);
        self.pipeline.clear_rows();
        self.stale = false;
        self.refresh(RefreshParams::new(Step::Everything).with_new_data(true))
    }

    /// Loads a JSON array of objects as the new dataset.
    ///
    /// Arrays under the `children` key become nested children. A document
    /// that is not an array is treated as no data.
    pub fn load_json(&mut self, json: &str) -> Result<Option<ModelUpdatedEvent>> {
        let document: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::invalid_dataset(e.to_string()))?;
        let records = match document.as_array() {
            Some(items) => {
                let mut records = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    match Record::from_json(item, Some(JSON_CHILDREN_KEY)) {
                        Some(record) => records.push(record.into_ref()),
                        None => warn!(index, "dataset item is not an object, skipping it"),
                    }
                }
                records
            }
            None => {
                warn!("dataset is not an array, treating it as no data");
                Vec::new()
            }
        };
        Ok(self.set_full_dataset(records))
    }

    /// Replaces the dataset, keeping the entities of records whose id is
    /// still present.
    ///
    /// Without an id function this behaves like `set_full_dataset`.
    pub fn apply_diff_dataset(&mut self, records: Vec<RecordRef>) -> Option<ModelUpdatedEvent> {
        let mut changes = ChangeSet::new();
        if !self.nodes.reconcile_by_id(records, &mut changes) {
            self.pipeline.clear_rows();
            self.stale = false;
            return self.refresh(RefreshParams::new(Step::Everything).with_new_data(true));
        }
        self.refresh(
            RefreshParams::new(Step::Group)
                .with_change_set(changes)
                .with_keep_render_rows(true)
                .with_animate(self.config.animate),
        )
    }

    /// Applies a transaction and refreshes the rows it touched.
    pub fn apply_transaction(&mut self, tx: Transaction) -> TransactionResult {
        let mut changes = ChangeSet::new();
        let result = self.nodes.apply_transaction(&tx, &mut changes);
        self.refresh_after_transactions(changes, tx.is_update_only());
        result
    }

    /// Queues a transaction to be applied with others after the batch wait.
    ///
    /// The result is delivered, after the refresh that includes it, to
    /// `callback` and to the returned receiver.
    pub fn apply_transaction_batched(
        &mut self,
        tx: Transaction,
        callback: Option<BatchCallback>,
    ) -> Receiver<TransactionResult> {
        self.batch.push(tx, callback, Instant::now(), self.config.batch_wait())
    }

    /// Applies every queued transaction now, in one pipeline run.
    ///
    /// Returns the number of transactions applied.
    pub fn flush_batched(&mut self) -> usize {
        let pending = self.batch.drain();
        if pending.is_empty() {
            return 0;
        }

        let mut changes = ChangeSet::new();
        let mut update_only = true;
        let mut results = Vec::with_capacity(pending.len());
        for item in &pending {
            update_only &= item.transaction.is_update_only();
            results.push(self.nodes.apply_transaction(&item.transaction, &mut changes));
        }
        debug!(transactions = pending.len(), changed = changes.len(), "flushing batched transactions");
        self.refresh_after_transactions(changes, update_only);

        let count = pending.len();
        for (item, result) in pending.into_iter().zip(results) {
            item.complete(result);
        }
        count
    }

    /// Flushes the queue if its deadline has passed.
    ///
    /// Returns true if a batch was applied.
    pub fn poll_batched(&mut self, now: Instant) -> bool {
        if !self.batch.is_due(now) {
            return false;
        }
        self.flush_batched() > 0
    }

    /// Number of transactions waiting in the queue.
    pub fn pending_transactions(&self) -> usize {
        self.batch.len()
    }

    /// Deadline of the queued batch, if any.
    pub fn batch_deadline(&self) -> Option<Instant> {
        self.batch.deadline()
    }

    fn refresh_after_transactions(&mut self, changes: ChangeSet, update_only: bool) {
        if update_only && self.config.suppress_model_update_after_update_transaction {
            debug!(updated = changes.updated.len(), "update transaction applied without refresh");
            self.stale = true;
            return;
        }
        self.refresh(
            RefreshParams::new(Step::Group)
                .with_change_set(changes)
                .with_keep_render_rows(true)
                .with_animate(self.config.animate),
        );
    }

    /// Runs the pipeline from `step`.
    pub fn refresh_model(&mut self, step: Step) -> Option<ModelUpdatedEvent> {
        self.refresh(
            RefreshParams::new(step)
                .with_keep_render_rows(true)
                .with_animate(self.config.animate),
        )
    }

    /// Runs the pipeline from the earliest step affected by `props`.
    pub fn on_properties_changed(&mut self, props: &[&str]) -> Option<ModelUpdatedEvent> {
        let step = self.pipeline.step_for_properties(props);
        if step == Step::Nothing {
            debug!(?props, "no stage depends on the changed properties");
            return None;
        }
        self.refresh_model(step)
    }

    /// Replaces the active sort options and re-sorts.
    pub fn set_sort(&mut self, options: Vec<SortOption>) -> Option<ModelUpdatedEvent> {
        self.sort_params.comparator.set_options(options.clone());
        self.config.sort = options;
        self.pipeline.set_stage(Box::new(SortStage::new(self.sort_params.clone())));
        self.on_properties_changed(&["sort"])
    }

    /// Replaces the row filter and re-filters.
    pub fn set_filter(&mut self, predicate: Option<RowPredicate>) -> Option<ModelUpdatedEvent> {
        self.pipeline.set_stage(Box::new(FilterStage::new(predicate)));
        self.on_properties_changed(&["filter"])
    }

    /// Replaces the group filter and re-filters groups.
    pub fn set_aggregate_filter(&mut self, predicate: Option<RowPredicate>) -> Option<ModelUpdatedEvent> {
        self.pipeline.set_stage(Box::new(FilterAggregatesStage::new(predicate)));
        self.on_properties_changed(&["aggregate_filter"])
    }

    /// Expands or collapses a row and re-flattens.
    ///
    /// Returns `None` when the flag did not change.
    pub fn set_expanded(&mut self, row: RowHandle, expanded: bool) -> Option<ModelUpdatedEvent> {
        if !self.nodes.tree_mut().set_expanded(row, expanded) {
            return None;
        }
        self.refresh_model(Step::Map)
    }

    /// Live leaf entity with the given id.
    pub fn row_by_id(&self, id: &str) -> Option<RowHandle> {
        self.nodes.row_by_id(id)
    }

    pub fn row_count(&self) -> usize {
        self.pipeline.row_count()
    }

    /// Displayed row at `index`.
    pub fn row_at(&self, index: usize) -> Option<&RowEntity> {
        self.pipeline.row_at(index).and_then(|row| self.tree().get(row))
    }

    /// Rows to display, in order.
    pub fn displayed_rows(&self) -> &[RowHandle] {
        self.pipeline.rows_to_display()
    }

    pub fn is_row_displayed(&self, row: RowHandle) -> bool {
        self.pipeline.is_row_displayed(self.tree(), row)
    }

    pub fn total_height(&self) -> u32 {
        self.pipeline.total_height(self.tree())
    }

    /// Display index of the row covering pixel `y`, clamped to the last row.
    pub fn display_index_at_pixel(&self, y: u32) -> Option<usize> {
        self.pipeline.display_index_at_pixel(self.tree(), y)
    }

    /// Visits every node below the root in grouped order, depth first.
    pub fn for_each_node<F>(&self, callback: F)
    where
        F: FnMut(RowHandle, &RowEntity, usize),
    {
        self.walk(WalkList::Group, callback);
    }

    /// Visits nodes that passed the filter.
    pub fn for_each_node_after_filter<F>(&self, callback: F)
    where
        F: FnMut(RowHandle, &RowEntity, usize),
    {
        self.walk(WalkList::Filter, callback);
    }

    /// Visits nodes that passed the filter, in sorted order.
    pub fn for_each_node_after_filter_and_sort<F>(&self, callback: F)
    where
        F: FnMut(RowHandle, &RowEntity, usize),
    {
        self.walk(WalkList::Sort, callback);
    }

    /// Visits every leaf in source order.
    pub fn for_each_leaf_node<F>(&self, mut callback: F)
    where
        F: FnMut(RowHandle, &RowEntity, usize),
    {
        let tree = self.tree();
        for (index, &row) in tree.leaves().iter().enumerate() {
            if let Some(entity) = tree.get(row) {
                callback(row, entity, index);
            }
        }
    }

    fn walk<F>(&self, list: WalkList, mut callback: F)
    where
        F: FnMut(RowHandle, &RowEntity, usize),
    {
        let tree = self.tree();
        let mut index = 0;
        let mut stack: Vec<RowHandle> = list.children(&tree[tree.root()]).iter().rev().copied().collect();
        while let Some(row) = stack.pop() {
            let Some(entity) = tree.get(row) else {
                continue;
            };
            callback(row, entity, index);
            index += 1;
            if entity.has_children() && !entity.footer {
                stack.extend(list.children(entity).iter().rev());
            }
        }
    }

    /// Subscribes to completed pipeline runs.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&ModelUpdatedEvent, &[RowEvent]) + 'static,
    {
        self.subscriptions.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    fn refresh(&mut self, mut params: RefreshParams) -> Option<ModelUpdatedEvent> {
        if self.stale && params.step != Step::Nothing {
            debug!(requested = %params.step, "model is stale, refreshing everything");
            params.step = Step::Everything;
            params.change_set = None;
            self.stale = false;
        }
        let event = self.pipeline.refresh_model(self.nodes.tree_mut(), params)?;
        let rows = self.nodes.tree_mut().take_events();
        self.subscriptions.notify_all(&event, &rows);
        Some(event)
    }
}
