//! Grouping, sorting, counting and text extraction

use crate::core::error::{QueryError, Result};
use crate::core::types::{LEVEL_COLUMN, SERVICE_COLUMN, TEXT_COLUMN, TOTAL_COUNT_COLUMN};
use crate::functions::args::optional_str;
use crate::pipeline::table::{numeric, text_of};
use crate::pipeline::{Row, Table};
use crate::plan::Args;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

/// Per-group calculation for `group_by_service`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calc {
    Avg,
    Sum,
    Count,
    Max,
    Min,
    /// Collect the raw values of each group
    None,
}

impl FromStr for Calc {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "avg" => Ok(Calc::Avg),
            "sum" => Ok(Calc::Sum),
            "count" => Ok(Calc::Count),
            "max" => Ok(Calc::Max),
            "min" => Ok(Calc::Min),
            "none" => Ok(Calc::None),
            other => Err(QueryError::invalid_argument(
                "calc",
                format!("unknown calc: {}", other),
            )),
        }
    }
}

impl Calc {
    fn name(self) -> &'static str {
        match self {
            Calc::Avg => "avg",
            Calc::Sum => "sum",
            Calc::Count => "count",
            Calc::Max => "max",
            Calc::Min => "min",
            Calc::None => "none",
        }
    }

    /// Output column for an aggregate over `field`
    pub fn column(self, field: &str) -> String {
        match self {
            Calc::None => format!("{}_list", field),
            other => format!("{}_{}", other.name(), field),
        }
    }

    fn apply(self, cells: Vec<Value>) -> Value {
        let numbers = || cells.iter().filter_map(numeric);
        match self {
            Calc::Count => Value::from(cells.len()),
            Calc::Sum => float(numbers().sum()),
            Calc::Avg => {
                let values: Vec<f64> = numbers().collect();
                if values.is_empty() {
                    Value::Null
                } else {
                    float(values.iter().sum::<f64>() / values.len() as f64)
                }
            }
            Calc::Max => numbers().reduce(f64::max).map_or(Value::Null, float),
            Calc::Min => numbers().reduce(f64::min).map_or(Value::Null, float),
            Calc::None => Value::Array(cells),
        }
    }
}

/// Integral results stay integers so `sum_Level` of `[1, 2]` renders as `3`
fn float(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
    }
}

/// Group rows by service label and aggregate `field`
///
/// Groups come out ordered by label, with rows lacking a label gathered in a
/// final group of their own.
pub fn group_by_service(table: Table, calc: Calc, field: &str) -> Result<Table> {
    if table.is_empty() {
        debug!("no data for grouping");
        return Ok(table);
    }
    table.require_column(SERVICE_COLUMN)?;
    table.require_column(field)?;
    debug!("grouping by service (calc={}, field={})", calc.name(), field);

    let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    let mut unlabeled: Option<Vec<Value>> = None;
    for mut row in table.into_rows() {
        let cell = row.remove(field).unwrap_or(Value::Null);
        match row.get(SERVICE_COLUMN).and_then(text_of) {
            Some(label) => groups.entry(label).or_default().push(cell),
            None => unlabeled.get_or_insert_with(Vec::new).push(cell),
        }
    }

    let value_column = calc.column(field);
    let mut rows: Vec<Row> = Vec::with_capacity(groups.len() + 1);
    let labeled = groups.into_iter().map(|(label, cells)| (Value::String(label), cells));
    for (label, cells) in labeled.chain(unlabeled.map(|cells| (Value::Null, cells))) {
        let mut row = Row::new();
        row.insert(SERVICE_COLUMN.to_string(), label);
        row.insert(value_column.clone(), calc.apply(cells));
        rows.push(row);
    }

    debug!("grouped {} rows", rows.len());
    Ok(Table::with_rows(
        vec![SERVICE_COLUMN.to_string(), value_column],
        rows,
    ))
}

pub fn group_by_service_step(table: Table, args: &Args) -> Result<Table> {
    let calc: Calc = optional_str(args, "calc")?.unwrap_or("count").parse()?;
    let field = optional_str(args, "field")?.unwrap_or(LEVEL_COLUMN);
    group_by_service(table, calc, field)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// "asc" sorts ascending; any other value sorts descending
    pub fn parse(order: &str) -> Self {
        if order.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }
}

/// Ordering of present values: numbers before strings, everything else last
fn compare_present(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Number(_) => 0,
            Value::String(_) => 1,
            Value::Bool(_) => 2,
            _ => 3,
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Stable sort on `field`; null cells always sort last
pub fn sort_results(table: Table, order: SortOrder, field: &str) -> Result<Table> {
    table.require_column(field)?;
    let columns = table.columns().to_vec();
    let mut rows = table.into_rows();
    rows.sort_by(|a, b| {
        let a = a.get(field).unwrap_or(&Value::Null);
        let b = b.get(field).unwrap_or(&Value::Null);
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match order {
                SortOrder::Asc => compare_present(a, b),
                SortOrder::Desc => compare_present(b, a),
            },
        }
    });
    debug!("sorted by {} ({:?})", field, order);
    Ok(Table::with_rows(columns, rows))
}

pub fn sort_results_step(table: Table, args: &Args) -> Result<Table> {
    let order = SortOrder::parse(optional_str(args, "order")?.unwrap_or("asc"));
    let field = match optional_str(args, "field")? {
        Some(field) => field.to_string(),
        None => match table.columns().last() {
            Some(last) => last.clone(),
            None => return Ok(table),
        },
    };
    sort_results(table, order, &field)
}

/// Single-row table holding the row count
pub fn count_records(table: &Table) -> Table {
    let mut row = Row::new();
    row.insert(TOTAL_COUNT_COLUMN.to_string(), Value::from(table.len()));
    Table::with_rows(vec![TOTAL_COUNT_COLUMN.to_string()], vec![row])
}

/// Non-null text values, stringified, in row order
pub fn get_texts(table: &Table) -> Result<Vec<String>> {
    debug!("extracting texts from {} rows", table.len());
    table.require_column(TEXT_COLUMN)?;
    Ok(table.values(TEXT_COLUMN).filter_map(text_of).collect())
}
