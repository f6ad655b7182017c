use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use tempfile::TempDir;
use textfile_import::{
    io_utils::InputSource,
    options::ImportOptions,
    parser::TextFileParser,
    schema::{ColumnType, TableDefinition, TargetColumn},
    sink::{MemorySink, RowSink},
};

fn generate_orders(rows: usize, multi_line: bool) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let path = temp_dir.path().join("orders.csv");
    let mut file = File::create(&path).expect("create csv");
    writeln!(file, "id,ordered_at,amount,status,note").expect("header");
    for i in 0..rows {
        let status = match i % 3 {
            0 => "shipped",
            1 => "pending",
            _ => "processing",
        };
        let day = (i % 28) + 1;
        let note = if multi_line && i % 10 == 0 {
            "\"call first\nthen ship\""
        } else {
            "\"none\""
        };
        writeln!(file, "{i},2024-01-{day:02},{}.{:02},{status},{note}", i % 500, i % 100)
            .expect("row");
    }
    (temp_dir, path)
}

fn orders_table() -> TableDefinition {
    TableDefinition::new(
        "orders",
        vec![
            TargetColumn::new("id", ColumnType::Integer),
            TargetColumn::new("ordered_at", ColumnType::Date),
            TargetColumn::new("amount", ColumnType::Decimal),
            TargetColumn::new("status", ColumnType::String),
            TargetColumn::new("note", ColumnType::String),
        ],
    )
}

/// Counts rows without keeping them so the benchmark measures parsing only.
#[derive(Default)]
struct CountingSink(usize);

impl RowSink for CountingSink {
    fn set_target_table(
        &mut self,
        _: &str,
        _: &[TargetColumn],
        _: Option<&Path>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn process_row(&mut self, _: &[Option<textfile_import::data::Value>]) -> anyhow::Result<()> {
        self.0 += 1;
        Ok(())
    }

    fn record_rejected(&mut self, _: &str, _: usize, _: &textfile_import::ImportError) {}

    fn table_import_finished(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

fn run_import(path: &Path, options: &ImportOptions, table: &TableDefinition) -> usize {
    let mut parser = TextFileParser::new(options.clone());
    let mut sink = CountingSink::default();
    parser
        .process(&InputSource::file(path), table, &mut sink)
        .expect("import");
    sink.0
}

fn bench_import(c: &mut Criterion) {
    let table = orders_table();
    let (single_dir, single_path) = generate_orders(50_000, false);
    let (multi_dir, multi_path) = generate_orders(50_000, true);
    let single = ImportOptions::default();
    let multi = ImportOptions {
        multi_line: true,
        ..ImportOptions::default()
    };

    let mut group = c.benchmark_group("import");
    group.bench_function("single_line", |b| {
        b.iter_batched(
            || (),
            |_| run_import(&single_path, &single, &table),
            BatchSize::SmallInput,
        );
    });
    group.bench_function("multi_line", |b| {
        b.iter_batched(
            || (),
            |_| run_import(&multi_path, &multi, &table),
            BatchSize::SmallInput,
        );
    });
    group.bench_function("preview_first_100", |b| {
        b.iter(|| {
            let mut parser = TextFileParser::new(single.clone());
            let mut sink = MemorySink::new().with_max_rows(Some(100));
            parser
                .process(&InputSource::file(&single_path), &table, &mut sink)
                .expect("preview");
            sink.rows.len()
        });
    });
    group.finish();
    drop(single_dir);
    drop(multi_dir);
}

criterion_group!(benches, bench_import);
criterion_main!(benches);
