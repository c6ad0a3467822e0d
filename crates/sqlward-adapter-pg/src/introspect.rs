//! Catalog lookups through `information_schema`.
//! System schemas (pg_catalog, information_schema) are never listed.

use sqlward_runtime::{ColumnInfo, TableInfo, TableSchema};
use sqlx::{PgPool, Row};
use std::collections::HashSet;

pub async fn list_tables(pool: &PgPool, schema: Option<&str>) -> anyhow::Result<Vec<TableInfo>> {
    let rows = sqlx::query(
        r#"
        select table_schema, table_name, table_type
        from information_schema.tables
        where table_schema not in ('pg_catalog', 'information_schema')
          and ($1::text is null or table_schema::text = $1::text)
        order by table_schema, table_name
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| TableInfo {
            schema: row.get("table_schema"),
            name: row.get("table_name"),
            kind: row.get("table_type"),
        })
        .collect())
}

/// Columns in ordinal order, with primary key membership. Without a schema
/// the table is looked up in `current_schema()`.
pub async fn describe_table(
    pool: &PgPool,
    schema: Option<&str>,
    table: &str,
) -> anyhow::Result<TableSchema> {
    let schema: String = match schema {
        Some(s) => s.to_string(),
        None => {
            let (current,): (String,) = sqlx::query_as("select current_schema()")
                .fetch_one(pool)
                .await?;
            current
        }
    };

    let col_rows = sqlx::query(
        r#"
        select column_name, data_type, is_nullable, column_default
        from information_schema.columns
        where table_schema = $1 and table_name = $2
        order by ordinal_position
        "#,
    )
    .bind(&schema)
    .bind(table)
    .fetch_all(pool)
    .await?;

    if col_rows.is_empty() {
        anyhow::bail!("table {schema}.{table} does not exist");
    }

    let pk_rows = sqlx::query(
        r#"
        select kcu.column_name
        from information_schema.table_constraints tc
        join information_schema.key_column_usage kcu
          on tc.constraint_name = kcu.constraint_name
         and tc.table_schema = kcu.table_schema
        where tc.constraint_type = 'PRIMARY KEY'
          and tc.table_schema = $1
          and tc.table_name = $2
        "#,
    )
    .bind(&schema)
    .bind(table)
    .fetch_all(pool)
    .await?;

    let primary_key: HashSet<String> = pk_rows
        .into_iter()
        .map(|r| r.get::<String, _>("column_name"))
        .collect();

    let columns = col_rows
        .into_iter()
        .map(|c| {
            let name: String = c.get("column_name");
            let is_nullable: String = c.get("is_nullable");
            ColumnInfo {
                primary_key: primary_key.contains(&name),
                data_type: c.get("data_type"),
                nullable: is_nullable == "YES",
                default: c.get("column_default"),
                name,
            }
        })
        .collect();

    Ok(TableSchema {
        schema,
        name: table.to_string(),
        columns,
    })
}
