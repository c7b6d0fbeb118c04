//! Column-wise join of feature tables on their time index.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::FeatureError;
use crate::table::FeatureTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JoinPolicy {
    /// Keep only rows where every column of every input is defined.
    #[default]
    DropLack,
    /// Keep the union of indices; absent cells stay missing.
    KeepAll,
}

pub fn join_tables(
    tables: &[FeatureTable],
    policy: JoinPolicy,
) -> Result<FeatureTable, FeatureError> {
    let mut seen = HashSet::new();
    for table in tables {
        for name in table.column_names() {
            if !seen.insert(name) {
                return Err(FeatureError::DuplicateColumn(name.to_string()));
            }
        }
    }

    let index: Vec<i64> = tables
        .iter()
        .flat_map(|t| t.index().iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let step_ms = common_step(tables);

    let mut union = FeatureTable::new(index.clone(), step_ms);
    for table in tables {
        let positions: HashMap<i64, usize> = table
            .index()
            .iter()
            .enumerate()
            .map(|(pos, ts)| (*ts, pos))
            .collect();
        for column in table.columns() {
            let values = index
                .iter()
                .map(|ts| positions.get(ts).and_then(|pos| column.values[*pos]))
                .collect();
            union.add_column(column.name.clone(), values)?;
        }
    }

    let joined = match policy {
        JoinPolicy::KeepAll => union,
        JoinPolicy::DropLack => {
            let keep: Vec<bool> = (0..union.len()).map(|row| union.row_is_complete(row)).collect();
            let filtered = union.filter_rows(&keep);
            if filtered.is_empty() && !union.is_empty() {
                warn!(
                    component = "join",
                    event = "join.no_overlap",
                    tables = tables.len(),
                    union_rows = union.len()
                );
                return Err(FeatureError::NoTimeOverlap {
                    tables: tables.len(),
                });
            }
            filtered
        }
    };

    // Both policies keep the nominal step; gaps in the result are surfaced.
    if let Err(err) = joined.check_regular() {
        warn!(
            component = "join",
            event = "join.grid_gap",
            policy = ?policy,
            error = %err
        );
    }

    info!(
        component = "join",
        event = "join.finish",
        policy = ?policy,
        tables = tables.len(),
        rows = joined.len(),
        column_count = joined.columns().len()
    );

    Ok(joined)
}

fn common_step(tables: &[FeatureTable]) -> Option<i64> {
    let first = tables.first()?.step_ms()?;
    tables
        .iter()
        .all(|t| t.step_ms() == Some(first))
        .then_some(first)
}
