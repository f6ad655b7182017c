use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::ColumnsArgs,
    import_cmd::build_options,
    io_utils::InputSource,
    mapping::ColumnMapping,
    parser::TextFileParser,
    schema::TableDefinition,
    table,
};

pub fn execute(args: &ColumnsArgs) -> Result<()> {
    let mut options = build_options(&args.parse)?;
    if !args.import_columns.is_empty() {
        options.import_columns = args.import_columns.clone();
    }
    let definition = TableDefinition::load(&args.parse.table)?;
    let mut parser = TextFileParser::new(options);
    let mapping = parser
        .resolve_columns(&InputSource::file(&args.parse.input), &definition)
        .with_context(|| format!("Resolving columns of {:?}", args.parse.input))?;
    info!(
        "{} of {} column(s) map onto table '{}'",
        mapping.target_column_count(),
        mapping.columns().len(),
        definition.name
    );
    let (headers, rows) = mapping_rows(&mapping);
    table::print_table(&headers, &rows);
    Ok(())
}

fn mapping_rows(mapping: &ColumnMapping) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = ["#", "source", "target", "type", "index", "width"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = mapping
        .columns()
        .iter()
        .map(|column| {
            let (target, datatype) = match &column.target {
                Some(target) => (
                    target.name.clone(),
                    target
                        .dbms_type
                        .clone()
                        .unwrap_or_else(|| target.datatype.to_string()),
                ),
                None => ("(skipped)".to_string(), String::new()),
            };
            vec![
                (column.source_index + 1).to_string(),
                column.name.clone(),
                target,
                datatype,
                column
                    .target_index
                    .map(|idx| idx.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                column
                    .data_width
                    .map(|w| w.to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect();
    (headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mapping::{MappingOptions, SKIP_COLUMN, SourceColumn},
        schema::{ColumnType, TargetColumn},
    };

    #[test]
    fn skipped_columns_are_marked() {
        let source = vec![SourceColumn::new("id"), SourceColumn::new(SKIP_COLUMN)];
        let target = vec![TargetColumn::new("id", ColumnType::Integer).with_dbms_type("BIGINT")];
        let mapping =
            ColumnMapping::resolve(&source, &target, "t", "in", &MappingOptions::default())
                .unwrap();
        let (headers, rows) = mapping_rows(&mapping);
        assert_eq!(headers.len(), 6);
        assert_eq!(rows[0], vec!["1", "id", "id", "BIGINT", "0", ""]);
        assert_eq!(rows[1][2], "(skipped)");
        assert_eq!(rows[1][4], "-");
    }
}
