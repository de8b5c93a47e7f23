use std::collections::BTreeMap;

use nl2sql_core::schema::{ColumnSchema, ForeignKey, Schema, TableSchema};

/// Base-table columns of the current database, in table and ordinal order.
pub const COLUMNS_SQL: &str = "\
SELECT c.table_name, c.column_name, c.column_type, c.is_nullable, c.column_default \
FROM information_schema.columns c \
JOIN information_schema.tables t \
  ON t.table_schema = c.table_schema AND t.table_name = c.table_name \
WHERE c.table_schema = DATABASE() AND t.table_type = 'BASE TABLE' \
ORDER BY c.table_name, c.ordinal_position";

/// Primary and foreign key columns of the current database.
pub const KEYS_SQL: &str = "\
SELECT k.table_name, k.constraint_name, k.column_name, \
       k.referenced_table_name, k.referenced_column_name \
FROM information_schema.key_column_usage k \
WHERE k.table_schema = DATABASE() \
  AND (k.constraint_name = 'PRIMARY' OR k.referenced_table_name IS NOT NULL) \
ORDER BY k.table_name, k.constraint_name, k.ordinal_position";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub table: String,
    pub column: String,
    pub column_type: String,
    pub is_nullable: String,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRow {
    pub table: String,
    pub constraint: String,
    pub column: String,
    pub referenced_table: Option<String>,
    pub referenced_column: Option<String>,
}

/// Fold `information_schema` rows into per-table metadata. Key rows for tables
/// without listed columns (views, hidden tables) are ignored.
pub fn assemble(columns: Vec<ColumnRow>, keys: Vec<KeyRow>) -> Schema {
    let mut tables: Vec<TableSchema> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for row in columns {
        let slot = *index.entry(row.table.clone()).or_insert_with(|| {
            tables.push(TableSchema {
                name: row.table.clone(),
                ..TableSchema::default()
            });
            tables.len() - 1
        });
        tables[slot].columns.push(ColumnSchema {
            name: row.column,
            data_type: row.column_type,
            nullable: row.is_nullable.eq_ignore_ascii_case("YES"),
            default: row.default,
        });
    }

    let mut foreign: BTreeMap<(String, String), ForeignKey> = BTreeMap::new();
    for row in keys {
        let Some(&slot) = index.get(&row.table) else {
            continue;
        };
        if row.constraint == "PRIMARY" {
            tables[slot].primary_key.push(row.column);
            continue;
        }
        let (Some(referenced_table), Some(referenced_column)) =
            (row.referenced_table, row.referenced_column)
        else {
            continue;
        };
        let fk = foreign
            .entry((row.table, row.constraint))
            .or_insert_with(|| ForeignKey {
                columns: Vec::new(),
                referenced_table,
                referenced_columns: Vec::new(),
            });
        fk.columns.push(row.column);
        fk.referenced_columns.push(referenced_column);
    }

    for ((table, _constraint), fk) in foreign {
        if let Some(&slot) = index.get(&table) {
            tables[slot].foreign_keys.push(fk);
        }
    }

    Schema { tables }
}
