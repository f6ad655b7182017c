use proptest::prelude::*;
use textfile_import::{
    io_utils::InputSource,
    mapping::{ColumnMapping, MappingOptions, SourceColumn},
    options::ImportOptions,
    parser::TextFileParser,
    schema::{ColumnType, TableDefinition, TargetColumn},
    sink::MemorySink,
};

fn destination(count: usize) -> Vec<TargetColumn> {
    (0..count)
        .map(|idx| TargetColumn::new(format!("c{idx}"), ColumnType::String))
        .collect()
}

/// Header of `count` columns plus a boolean mask choosing the allow-list.
fn header_and_allow_list() -> impl Strategy<Value = (usize, Vec<bool>)> {
    (1usize..24).prop_flat_map(|count| {
        (
            Just(count),
            prop::collection::vec(any::<bool>(), count)
                .prop_filter("at least one column allowed", |mask| mask.iter().any(|m| *m)),
        )
    })
}

proptest! {
    #[test]
    fn allow_list_yields_dense_target_indexes((count, mask) in header_and_allow_list()) {
        let source: Vec<_> = (0..count).map(|idx| SourceColumn::new(format!("c{idx}"))).collect();
        let allowed: Vec<String> = mask
            .iter()
            .enumerate()
            .filter(|(_, keep)| **keep)
            .map(|(idx, _)| format!("c{idx}"))
            .collect();
        let options = MappingOptions {
            import_columns: allowed.clone(),
            ..MappingOptions::default()
        };
        let mapping = ColumnMapping::resolve(&source, &destination(count), "t", "input", &options)
            .unwrap();

        let indexes: Vec<usize> = mapping.columns().iter().filter_map(|c| c.target_index).collect();
        prop_assert_eq!(indexes.len(), allowed.len());
        prop_assert_eq!(indexes, (0..allowed.len()).collect::<Vec<_>>());
        prop_assert_eq!(mapping.target_column_count(), allowed.len());
    }

    #[test]
    fn decoded_rows_match_target_width(
        (count, mask) in header_and_allow_list(),
        values in prop::collection::vec("[a-z]{1,6}", 24),
    ) {
        let header: Vec<String> = (0..count).map(|idx| format!("c{idx}")).collect();
        let line: Vec<&str> = values.iter().take(count).map(String::as_str).collect();
        let input = format!("{}\n{}\n", header.join(","), line.join(","));
        let allowed: Vec<String> = mask
            .iter()
            .enumerate()
            .filter(|(_, keep)| **keep)
            .map(|(idx, _)| format!("c{idx}"))
            .collect();
        let options = ImportOptions {
            import_columns: allowed.clone(),
            ..ImportOptions::default()
        };
        let table = TableDefinition::new("t", destination(count));
        let mut parser = TextFileParser::new(options);
        let mut sink = MemorySink::new();
        parser.process(&InputSource::text("generated", input), &table, &mut sink).unwrap();

        prop_assert_eq!(sink.rows.len(), 1);
        prop_assert_eq!(sink.rows[0].len(), allowed.len());
        prop_assert_eq!(sink.column_names(), allowed);
    }
}
