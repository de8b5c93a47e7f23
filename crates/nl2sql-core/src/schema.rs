use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Table metadata read from the configured database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub tables: Vec<TableSchema>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    /// Dialect type as reported by the server, e.g. `varchar(100)`.
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

impl Schema {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table name to column names, as returned by the schema endpoint.
    pub fn column_map(&self) -> BTreeMap<String, Vec<String>> {
        self.tables
            .iter()
            .map(|table| {
                let columns = table.columns.iter().map(|c| c.name.clone()).collect();
                (table.name.clone(), columns)
            })
            .collect()
    }

    /// Render the schema as `CREATE TABLE` statements for prompting.
    pub fn to_ddl(&self) -> String {
        self.tables
            .iter()
            .map(TableSchema::to_ddl)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl TableSchema {
    pub fn to_ddl(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                let nullable = if column.nullable { "NULL" } else { "NOT NULL" };
                let mut line = format!("    {} {} {}", column.name, column.data_type, nullable);
                if let Some(default) = &column.default {
                    line.push_str(&format!(" DEFAULT {default}"));
                }
                line
            })
            .collect();

        if !self.primary_key.is_empty() {
            lines.push(format!("    PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        for fk in &self.foreign_keys {
            lines.push(format!(
                "    FOREIGN KEY ({}) REFERENCES {}({})",
                fk.columns.join(", "),
                fk.referenced_table,
                fk.referenced_columns.join(", ")
            ));
        }

        format!("CREATE TABLE {} (\n{}\n);", self.name, lines.join(",\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str, nullable: bool) -> ColumnSchema {
        ColumnSchema {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default: None,
        }
    }

    fn sample() -> Schema {
        Schema {
            tables: vec![
                TableSchema {
                    name: "breeds".into(),
                    columns: vec![column("id", "int", false), column("name", "varchar(100)", true)],
                    primary_key: vec!["id".into()],
                    foreign_keys: vec![],
                },
                TableSchema {
                    name: "dogs".into(),
                    columns: vec![
                        column("id", "int", false),
                        column("breed_id", "int", true),
                        ColumnSchema {
                            name: "is_available".into(),
                            data_type: "tinyint(1)".into(),
                            nullable: false,
                            default: Some("1".into()),
                        },
                    ],
                    primary_key: vec!["id".into()],
                    foreign_keys: vec![ForeignKey {
                        columns: vec!["breed_id".into()],
                        referenced_table: "breeds".into(),
                        referenced_columns: vec!["id".into()],
                    }],
                },
            ],
        }
    }

    #[test]
    fn renders_create_table_statements() {
        let ddl = sample().to_ddl();
        let expected = "CREATE TABLE breeds (\n    id int NOT NULL,\n    name varchar(100) NULL,\n    PRIMARY KEY (id)\n);\n\nCREATE TABLE dogs (\n    id int NOT NULL,\n    breed_id int NULL,\n    is_available tinyint(1) NOT NULL DEFAULT 1,\n    PRIMARY KEY (id),\n    FOREIGN KEY (breed_id) REFERENCES breeds(id)\n);";
        assert_eq!(ddl, expected);
    }

    #[test]
    fn column_map_lists_columns_per_table() {
        let map = sample().column_map();
        assert_eq!(map["dogs"], vec!["id", "breed_id", "is_available"]);
        assert_eq!(map["breeds"], vec!["id", "name"]);
    }
}
