use crate::cli::{GenerateArgs, InitArgs, InspectArgs};
use crate::codegen::{generate_schema, GeneratedFile};
use crate::config::{ProjectConfig, INIT_TEMPLATE};
use crate::introspect::{connect_db, load_schema};
use crate::type_mapper::TypeMapper;
use crate::write::sync_generated;

pub async fn run(args: GenerateArgs) -> anyhow::Result<()> {
    let project = ProjectConfig::load(args.config)?;
    let database_url = args
        .database
        .unwrap_or_else(|| project.file.database.url.clone());
    let out_dir = project.resolve_path(&project.file.output.dir);
    let schemas = project.file.schemas();

    let client = connect_db(&database_url).await?;

    let mut files = Vec::new();
    for schema in &schemas {
        let def = load_schema(&client, schema).await?;
        let mapper = TypeMapper::new(project.file.types.clone(), &def.enums);
        files.push(GeneratedFile {
            path: out_dir.join(format!("{schema}.rs")),
            content: generate_schema(&def, &mapper),
        });
    }

    let report = sync_generated(&files, args.mode)?;
    if report.stale.is_empty() {
        println!("up to date ({} schemas)", schemas.len());
    }
    Ok(())
}

pub fn init(args: InitArgs) -> anyhow::Result<()> {
    if args.config.exists() {
        anyhow::bail!("refusing to overwrite {}", args.config.display());
    }
    std::fs::write(&args.config, INIT_TEMPLATE)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", args.config.display()))?;
    println!("wrote {}", args.config.display());
    Ok(())
}

pub async fn inspect(args: InspectArgs) -> anyhow::Result<()> {
    let (database_url, schemas) = if args.config.exists() {
        let project = ProjectConfig::load(args.config.clone())?;
        let url = args
            .database
            .clone()
            .unwrap_or_else(|| project.file.database.url.clone());
        let schemas = args.schemas.clone().unwrap_or_else(|| project.file.schemas());
        (url, schemas)
    } else {
        let Some(url) = args.database.clone() else {
            anyhow::bail!(
                "failed to load config {}; provide --database or run `pgshape gen init` first",
                args.config.display()
            );
        };
        let schemas = args
            .schemas
            .clone()
            .unwrap_or_else(|| vec!["public".to_string()]);
        (url, schemas)
    };

    let client = connect_db(&database_url).await?;
    for schema in &schemas {
        let def = load_schema(&client, schema).await?;
        println!(
            "{schema}: {} tables, {} enums",
            def.tables.len(),
            def.enums.len()
        );
        for table in &def.tables {
            println!(
                "  {} ({} columns, {} unique indexes)",
                table.name,
                table.columns.len(),
                table.unique_indexes.len()
            );
        }
        for enum_def in &def.enums {
            println!("  enum {} [{}]", enum_def.name, enum_def.labels.join(", "));
        }
    }
    Ok(())
}
