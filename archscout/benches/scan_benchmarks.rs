use archscout::{scan_archives, ScanOptions, TermSet};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fs::File;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tempfile::tempdir;
use zip::write::FileOptions;

fn create_test_archive(
    dir: &tempfile::TempDir,
    entry_count: usize,
    lines_per_entry: usize,
) -> std::io::Result<PathBuf> {
    let path = dir.path().join("bench.zip");
    let mut writer = zip::ZipWriter::new(File::create(&path)?);
    for i in 0..entry_count {
        writer.start_file(format!("entry_{}.txt", i), FileOptions::default())?;
        for j in 0..lines_per_entry {
            writeln!(writer, "Line {} in entry {}: nothing special", j, i)?;
            if j % 50 == 0 {
                writeln!(writer, "Contact via wickr id {} line {}", i, j)?;
            }
        }
    }
    writer.finish()?;
    Ok(path)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_literal_terms(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let archive = create_test_archive(&dir, 200, 200).unwrap();
    let archives = vec![archive];
    let rt = runtime();

    let mut group = c.benchmark_group("Literal Term Scan");
    group.sample_size(10);

    let options = ScanOptions::new(TermSet::literal(["protonmail", "wickr"]))
        .with_read_concurrency(NonZeroUsize::new(4).unwrap());

    group.bench_function("scan_literal", |b| {
        b.to_async(&rt).iter(|| async {
            scan_archives(black_box(&archives), black_box(&options))
                .await
                .unwrap();
        });
    });

    group.finish();
}

fn bench_regex_terms(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let archive = create_test_archive(&dir, 200, 200).unwrap();
    let archives = vec![archive];
    let rt = runtime();

    let mut group = c.benchmark_group("Regex Term Scan");
    group.sample_size(10);

    let options = ScanOptions::new(TermSet::regex([r"wickr id \d+ line \d+"]));

    group.bench_function("scan_regex", |b| {
        b.to_async(&rt).iter(|| async {
            scan_archives(black_box(&archives), black_box(&options))
                .await
                .unwrap();
        });
    });

    group.finish();
}

fn bench_bounded_reads(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let archive = create_test_archive(&dir, 50, 5000).unwrap();
    let archives = vec![archive];
    let rt = runtime();

    let mut group = c.benchmark_group("Bounded Entry Reads");
    group.sample_size(10);

    for limit in [None, Some(4 * 1024), Some(64 * 1024)] {
        let options =
            ScanOptions::new(TermSet::literal(["wickr"])).with_max_entry_size(limit);
        let name = match limit {
            Some(bytes) => format!("limit_{}", bytes),
            None => "unbounded".to_string(),
        };
        group.bench_function(name, |b| {
            b.to_async(&rt).iter(|| async {
                scan_archives(black_box(&archives), black_box(&options))
                    .await
                    .unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_literal_terms,
    bench_regex_terms,
    bench_bounded_reads
);
criterion_main!(benches);
