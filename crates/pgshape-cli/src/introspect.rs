//! Catalog introspection.
//!
//! Reads the schema description the generator works from: tables and their
//! columns (with `format_type` output, nullability, default presence), unique
//! indexes, and enum types with labels in catalog order.

use tokio_postgres::NoTls;

#[derive(Debug, Clone)]
pub struct SchemaDef {
    pub name: String,
    pub tables: Vec<TableDef>,
    pub enums: Vec<EnumDef>,
}

#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub unique_indexes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    /// `format_type` output, e.g. `character varying(255)` or `integer[]`.
    pub sql_type: String,
    pub is_nullable: bool,
    pub has_default: bool,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    /// Labels in `enumsortorder` order.
    pub labels: Vec<String>,
}

const TABLES_SQL: &str = "\
SELECT c.relname
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1 AND c.relkind IN ('r', 'p', 'v', 'm')
ORDER BY c.relname";

const COLUMNS_SQL: &str = "\
SELECT a.attname,
       format_type(a.atttypid, a.atttypmod) AS sql_type,
       NOT a.attnotnull AS is_nullable,
       a.atthasdef AS has_default
FROM pg_attribute a
JOIN pg_class c ON c.oid = a.attrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY a.attnum";

const UNIQUE_INDEXES_SQL: &str = "\
SELECT ci.relname
FROM pg_index i
JOIN pg_class ci ON ci.oid = i.indexrelid
JOIN pg_class ct ON ct.oid = i.indrelid
JOIN pg_namespace n ON n.oid = ct.relnamespace
WHERE n.nspname = $1 AND ct.relname = $2 AND i.indisunique
ORDER BY ci.relname";

const ENUMS_SQL: &str = "\
SELECT t.typname, e.enumlabel
FROM pg_type t
JOIN pg_enum e ON t.oid = e.enumtypid
JOIN pg_namespace n ON n.oid = t.typnamespace
WHERE n.nspname = $1
ORDER BY t.typname, e.enumsortorder";

pub async fn connect_db(database_url: &str) -> anyhow::Result<tokio_postgres::Client> {
    let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("postgres connection error: {e}");
        }
    });
    Ok(client)
}

pub async fn load_schema(
    client: &tokio_postgres::Client,
    schema: &str,
) -> anyhow::Result<SchemaDef> {
    let mut tables = Vec::new();
    for row in client.query(TABLES_SQL, &[&schema]).await? {
        let table: String = row.get(0);

        let columns = client
            .query(COLUMNS_SQL, &[&schema, &table])
            .await?
            .into_iter()
            .map(|row| ColumnDef {
                name: row.get(0),
                sql_type: row.get(1),
                is_nullable: row.get(2),
                has_default: row.get(3),
            })
            .collect();

        let unique_indexes = client
            .query(UNIQUE_INDEXES_SQL, &[&schema, &table])
            .await?
            .into_iter()
            .map(|row| row.get(0))
            .collect();

        tables.push(TableDef {
            name: table,
            columns,
            unique_indexes,
        });
    }

    let mut enums: Vec<EnumDef> = Vec::new();
    for row in client.query(ENUMS_SQL, &[&schema]).await? {
        let name: String = row.get(0);
        let label: String = row.get(1);
        match enums.last_mut() {
            Some(last) if last.name == name => last.labels.push(label),
            _ => enums.push(EnumDef {
                name,
                labels: vec![label],
            }),
        }
    }

    Ok(SchemaDef {
        name: schema.to_string(),
        tables,
        enums,
    })
}
