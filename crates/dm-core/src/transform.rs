//! Transform pipeline: column selection, renaming and row filtering
//!
//! Every step takes a table by reference and returns a new one, so a preview
//! can be recomputed from any point. Steps run in a fixed order:
//! selection, then renaming, then filtering.

use crate::error::{Error, Result};
use crate::merger::COLLISION_SUFFIX;
use crate::table::{CellValue, Column, Row, Table};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Comparison applied by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    IsNull,
}

impl FromStr for FilterOperator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '_'], "-");
        match normalized.as_str() {
            "equals" | "eq" | "=" | "==" => Ok(FilterOperator::Equals),
            "not-equals" | "ne" | "!=" => Ok(FilterOperator::NotEquals),
            "greater-than" | "gt" | ">" => Ok(FilterOperator::GreaterThan),
            "less-than" | "lt" | "<" => Ok(FilterOperator::LessThan),
            "contains" => Ok(FilterOperator::Contains),
            "is-null" | "null" => Ok(FilterOperator::IsNull),
            _ => Err(format!("unknown filter operator '{}'", s)),
        }
    }
}

/// One filter predicate: (column, operator, comparison value)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub column: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: String,
}

impl FilterSpec {
    /// Create a new filter
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// Filters with a blank value do nothing, except `is-null`
    pub fn is_active(&self) -> bool {
        self.operator == FilterOperator::IsNull || !self.value.is_empty()
    }
}

/// Parses `column:operator:value`
impl FromStr for FilterSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(3, ':').collect();
        match parts.as_slice() {
            [column, operator] => Ok(FilterSpec::new(*column, operator.parse()?, "")),
            [column, operator, value] => Ok(FilterSpec::new(*column, operator.parse()?, *value)),
            _ => Err(format!("invalid filter '{}', expected 'column:operator:value'", s)),
        }
    }
}

/// A complete set of transform steps, saved to and loaded from JSON recipes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    /// Columns to keep, in output order; `None` keeps all
    #[serde(default)]
    pub select: Option<Vec<String>>,
    /// Old name -> new name
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    /// Suffix to strip from column names, typically `_right`
    #[serde(default)]
    pub strip_suffix: Option<String>,
    /// Predicates combined with AND
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

impl TransformSpec {
    /// Create an empty spec (identity transform)
    pub fn new() -> Self {
        Self::default()
    }

    /// Template recipe showing every option
    pub fn template() -> Self {
        let mut rename = BTreeMap::new();
        rename.insert("Description".to_string(), "Item".to_string());

        Self {
            select: Some(vec!["UPC".to_string(), "Description".to_string(), "Price".to_string()]),
            rename,
            strip_suffix: Some(COLLISION_SUFFIX.to_string()),
            filters: vec![FilterSpec::new("Price", FilterOperator::GreaterThan, "0")],
        }
    }

    /// Run selection, renaming and filtering in order
    pub fn apply(&self, table: &Table) -> Result<Table> {
        let selected = match &self.select {
            Some(names) => select_columns(table, names)?,
            None => table.clone(),
        };
        let renamed = rename_columns(&selected, &self.rename, self.strip_suffix.as_deref())?;
        apply_filters(&renamed, &self.filters)
    }

    /// Load a recipe from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the recipe to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Project onto the named columns, in the given order
pub fn select_columns(table: &Table, names: &[String]) -> Result<Table> {
    if names.is_empty() {
        return Err(Error::EmptySelection);
    }

    let mut seen = HashSet::new();
    let mut picked: Vec<&Column> = Vec::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            continue;
        }
        picked.push(table.find_column(name).ok_or_else(|| unknown_column(table, name))?);
    }

    let columns = picked
        .iter()
        .enumerate()
        .map(|(i, &src)| Column {
            index: i,
            ..src.clone()
        })
        .collect();

    let rows = table
        .rows
        .iter()
        .map(|row| {
            Row::new(
                picked
                    .iter()
                    .map(|src| row.get(src.index).cloned().unwrap_or(CellValue::Empty))
                    .collect(),
            )
        })
        .collect();

    Ok(Table {
        name: table.name.clone(),
        columns,
        rows,
    })
}

/// Renames that strip `suffix` from column names.
///
/// A column is skipped when its stripped name already belongs to another
/// column, so `price` and `price_right` can coexist.
pub fn strip_suffix_renames(table: &Table, suffix: &str) -> BTreeMap<String, String> {
    let existing: HashSet<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    let mut renames = BTreeMap::new();

    if suffix.is_empty() {
        return renames;
    }

    for column in &table.columns {
        let mut stripped = column.name.as_str();
        while let Some(shorter) = stripped.strip_suffix(suffix) {
            stripped = shorter;
        }
        if stripped.is_empty() || stripped == column.name || existing.contains(stripped) {
            continue;
        }
        renames.insert(column.name.clone(), stripped.to_string());
    }

    renames
}

/// Apply suffix stripping, then the explicit mapping on top.
///
/// Mapping entries for absent columns are ignored so the step can be
/// reapplied to its own output.
pub fn rename_columns(
    table: &Table,
    mapping: &BTreeMap<String, String>,
    strip_suffix: Option<&str>,
) -> Result<Table> {
    let mut renames = strip_suffix
        .map(|suffix| strip_suffix_renames(table, suffix))
        .unwrap_or_default();

    for (old, new) in mapping {
        let new = new.trim();
        if new.is_empty() || old == new {
            continue;
        }
        if table.find_column(old).is_none() {
            tracing::debug!(column = %old, table = %table.name, "rename skipped, column absent");
            continue;
        }
        renames.insert(old.clone(), new.to_string());
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(table.column_count());
    for column in &table.columns {
        let name = renames.get(&column.name).cloned().unwrap_or_else(|| column.name.clone());
        if !seen.insert(name.clone()) {
            return Err(Error::NameCollision { name });
        }
        columns.push(Column {
            name,
            ..column.clone()
        });
    }

    Ok(Table {
        name: table.name.clone(),
        columns,
        rows: table.rows.clone(),
    })
}

/// Keep rows matching every active filter.
///
/// Column types are pinned on the output, so a rerun compares the same way
/// even if only numeric cells survived a text filter.
pub fn apply_filters(table: &Table, filters: &[FilterSpec]) -> Result<Table> {
    let predicates = filters
        .iter()
        .filter(|f| f.is_active())
        .map(|f| Predicate::compile(table, f))
        .collect::<Result<Vec<_>>>()?;

    let rows = table
        .rows
        .iter()
        .filter(|row| predicates.iter().all(|p| p.matches(row)))
        .cloned()
        .collect();

    Ok(Table {
        name: table.name.clone(),
        columns: table.pinned_columns(),
        rows,
    })
}

enum Target {
    Number(f64),
    Text(String),
    Nothing,
}

struct Predicate {
    index: usize,
    operator: FilterOperator,
    target: Target,
}

impl Predicate {
    fn compile(table: &Table, spec: &FilterSpec) -> Result<Self> {
        let column = table
            .find_column(&spec.column)
            .ok_or_else(|| unknown_column(table, &spec.column))?;
        let column_type = table.column_type(column.index);

        let target = match spec.operator {
            FilterOperator::IsNull => Target::Nothing,
            FilterOperator::Contains => Target::Text(spec.value.clone()),
            _ if column_type.is_numeric() => {
                let number = spec.value.trim().parse::<f64>().map_err(|_| Error::InvalidFilterValue {
                    column: spec.column.clone(),
                    value: spec.value.clone(),
                    expected: format!("a number ({} column)", column_type),
                })?;
                Target::Number(number)
            }
            _ => Target::Text(spec.value.clone()),
        };

        Ok(Self {
            index: column.index,
            operator: spec.operator,
            target,
        })
    }

    fn matches(&self, row: &Row) -> bool {
        let cell = match row.get(self.index) {
            Some(cell) => cell,
            None => return false,
        };

        if self.operator == FilterOperator::IsNull {
            return cell.is_empty();
        }
        if cell.is_empty() {
            return false;
        }

        match &self.target {
            Target::Number(target) => match cell.as_f64() {
                Some(value) => compare(self.operator, &value, target),
                None => false,
            },
            Target::Text(target) => {
                let value = cell.to_string_value();
                match self.operator {
                    FilterOperator::Contains => value.contains(target.as_str()),
                    op => compare(op, &value, target),
                }
            }
            Target::Nothing => false,
        }
    }
}

fn compare<T: PartialOrd + ?Sized>(operator: FilterOperator, value: &T, target: &T) -> bool {
    match operator {
        FilterOperator::Equals => value == target,
        FilterOperator::NotEquals => value != target,
        FilterOperator::GreaterThan => value > target,
        FilterOperator::LessThan => value < target,
        FilterOperator::Contains | FilterOperator::IsNull => false,
    }
}

fn unknown_column(table: &Table, name: &str) -> Error {
    Error::UnknownColumn {
        column: name.to_string(),
        table: table.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_csv_str;
    use crate::table::ColumnType;

    fn sample() -> Table {
        parse_csv_str(
            "UPC,Description,price,price_right,qty_right\n1,apple,5,6,10\n2,pear,15,14,\n3,apple pie,25,26,30\n",
            "merged",
        )
        .unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_columns_in_order() {
        let table = sample();
        let selected = select_columns(&table, &names(&["price", "UPC"])).unwrap();

        assert_eq!(selected.column_names(), vec!["price", "UPC"]);
        assert_eq!(selected.rows[0].cells, vec![CellValue::Integer(5), CellValue::Integer(1)]);
        // Input untouched
        assert_eq!(table.column_count(), 5);
    }

    #[test]
    fn test_select_is_idempotent() {
        let spec = names(&["UPC", "price", "UPC"]);
        let once = select_columns(&sample(), &spec).unwrap();
        let twice = select_columns(&once, &spec).unwrap();

        assert_eq!(once.column_names(), vec!["UPC", "price"]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_select_unknown_column() {
        let err = select_columns(&sample(), &names(&["UPC", "cost"])).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { ref column, .. } if column == "cost"));
    }

    #[test]
    fn test_select_empty() {
        assert!(matches!(select_columns(&sample(), &[]), Err(Error::EmptySelection)));
    }

    #[test]
    fn test_rename_mapping() {
        let mut mapping = BTreeMap::new();
        mapping.insert("Description".to_string(), "Item".to_string());

        let renamed = rename_columns(&sample(), &mapping, None).unwrap();
        assert_eq!(renamed.columns[1].name, "Item");

        let again = rename_columns(&renamed, &mapping, None).unwrap();
        assert_eq!(renamed, again);
    }

    #[test]
    fn test_rename_collision() {
        let mut mapping = BTreeMap::new();
        mapping.insert("price_right".to_string(), "price".to_string());

        let err = rename_columns(&sample(), &mapping, None).unwrap_err();
        assert!(matches!(err, Error::NameCollision { ref name } if name == "price"));
    }

    #[test]
    fn test_strip_suffix() {
        let renamed = rename_columns(&sample(), &BTreeMap::new(), Some("_right")).unwrap();

        // price_right would clash with price, so it stays
        assert_eq!(
            renamed.column_names(),
            vec!["UPC", "Description", "price", "price_right", "qty"]
        );

        let again = rename_columns(&renamed, &BTreeMap::new(), Some("_right")).unwrap();
        assert_eq!(renamed, again);
    }

    #[test]
    fn test_strip_suffix_after_selection() {
        let spec = TransformSpec {
            select: Some(names(&["UPC", "price_right"])),
            strip_suffix: Some("_right".to_string()),
            ..TransformSpec::default()
        };

        let result = spec.apply(&sample()).unwrap();
        assert_eq!(result.column_names(), vec!["UPC", "price"]);
        assert_eq!(result.rows[1].cells[1], CellValue::Integer(14));
    }

    #[test]
    fn test_filter_greater_than() {
        let filters = vec![FilterSpec::new("price", FilterOperator::GreaterThan, "10")];
        let filtered = apply_filters(&sample(), &filters).unwrap();

        let prices: Vec<CellValue> = filtered.rows.iter().map(|r| r.cells[2].clone()).collect();
        assert_eq!(prices, vec![CellValue::Integer(15), CellValue::Integer(25)]);
    }

    #[test]
    fn test_filters_combine_with_and() {
        let filters = vec![
            FilterSpec::new("Description", FilterOperator::Contains, "apple"),
            FilterSpec::new("price", FilterOperator::LessThan, "20"),
        ];
        let filtered = apply_filters(&sample(), &filters).unwrap();

        assert_eq!(filtered.row_count(), 1);
        assert_eq!(filtered.rows[0].cells[0], CellValue::Integer(1));

        let again = apply_filters(&filtered, &filters).unwrap();
        assert_eq!(filtered, again);
    }

    #[test]
    fn test_filter_equality_and_nulls() {
        let table = sample();

        let equals = apply_filters(&table, &[FilterSpec::new("price", FilterOperator::Equals, "15.0")]).unwrap();
        assert_eq!(equals.row_count(), 1);

        // The empty qty_right cell satisfies only is-null
        let not_equals =
            apply_filters(&table, &[FilterSpec::new("qty_right", FilterOperator::NotEquals, "10")]).unwrap();
        assert_eq!(not_equals.row_count(), 1);

        let nulls = apply_filters(&table, &[FilterSpec::new("qty_right", FilterOperator::IsNull, "")]).unwrap();
        assert_eq!(nulls.row_count(), 1);
        assert_eq!(nulls.rows[0].cells[1], CellValue::String("pear".to_string()));
    }

    #[test]
    fn test_filter_blank_value_is_skipped() {
        let filtered =
            apply_filters(&sample(), &[FilterSpec::new("Description", FilterOperator::Equals, "")]).unwrap();
        assert_eq!(filtered.row_count(), 3);
    }

    #[test]
    fn test_filter_rerun_keeps_column_type() {
        let table = parse_csv_str("UPC,code\n1,x\n2,5\n", "merged").unwrap();
        let filters = vec![FilterSpec::new("code", FilterOperator::LessThan, "a")];

        // "5" < "a" as text; only the numeric cell survives
        let once = apply_filters(&table, &filters).unwrap();
        assert_eq!(once.row_count(), 1);
        assert_eq!(once.rows[0].cells[1], CellValue::Integer(5));
        assert_eq!(once.column_type(1), ColumnType::String);

        let twice = apply_filters(&once, &filters).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_select_and_rename_keep_pinned_type() {
        let table = parse_csv_str("UPC,code\n1,x\n2,5\n", "merged").unwrap();
        let numeric_only =
            apply_filters(&table, &[FilterSpec::new("code", FilterOperator::NotEquals, "x")]).unwrap();

        let selected = select_columns(&numeric_only, &names(&["code"])).unwrap();
        let mapping = BTreeMap::from([("code".to_string(), "sku".to_string())]);
        let renamed = rename_columns(&selected, &mapping, None).unwrap();

        assert_eq!(renamed.column_names(), vec!["sku"]);
        assert_eq!(renamed.column_type(0), ColumnType::String);
    }

    #[test]
    fn test_filter_invalid_value() {
        let err =
            apply_filters(&sample(), &[FilterSpec::new("price", FilterOperator::GreaterThan, "ten")]).unwrap_err();
        assert!(matches!(err, Error::InvalidFilterValue { ref column, .. } if column == "price"));
    }

    #[test]
    fn test_filter_unknown_column() {
        let err = apply_filters(&sample(), &[FilterSpec::new("cost", FilterOperator::IsNull, "")]).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }

    #[test]
    fn test_filter_spec_from_str() {
        let spec: FilterSpec = "price:greater-than:10".parse().unwrap();
        assert_eq!(spec, FilterSpec::new("price", FilterOperator::GreaterThan, "10"));

        let spec: FilterSpec = "note:contains:a:b".parse().unwrap();
        assert_eq!(spec.value, "a:b");

        let spec: FilterSpec = "qty:is null".parse().unwrap();
        assert_eq!(spec.operator, FilterOperator::IsNull);

        assert!("price".parse::<FilterSpec>().is_err());
        assert!("price:between:1".parse::<FilterSpec>().is_err());
    }

    #[test]
    fn test_recipe_json_roundtrip() {
        let recipe = TransformSpec::template();
        let json = serde_json::to_string_pretty(&recipe).unwrap();
        assert!(json.contains("\"greater-than\""));

        let loaded: TransformSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, recipe);

        let partial: TransformSpec = serde_json::from_str(r#"{"strip_suffix": "_right"}"#).unwrap();
        assert!(partial.select.is_none());
        assert!(partial.filters.is_empty());
    }
}
