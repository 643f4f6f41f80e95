use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reg_file::{RegistryFile, ValueData};

fn build_file(keys: usize) -> RegistryFile {
    let mut file = RegistryFile::new();
    for i in 0..keys {
        let key = file
            .tree_mut()
            .create_path(&format!(r"HKEY_LOCAL_MACHINE\Software\Bench\Key{}", i))
            .unwrap();
        let tree = file.tree_mut();
        tree.add_value(key, "", format!("default {}", i)).unwrap();
        tree.add_value(key, "Count", i as u32).unwrap();
        tree.add_value(key, "Blob", vec![(i % 256) as u8; 128]).unwrap();
        tree.add_value(key, "Path", ValueData::ExpandString(r"%SystemRoot%\system32".into()))
            .unwrap();
        tree.add_value(
            key,
            "List",
            ValueData::MultiString(vec!["alpha".into(), "beta".into(), "gamma".into()]),
        )
        .unwrap();
        file.add_key(key, false).unwrap();
    }
    file
}

fn bench_serialize(c: &mut Criterion) {
    let file = build_file(500);
    c.bench_function("serialize 500 keys", |b| {
        b.iter(|| black_box(file.to_reg_string()))
    });
}

fn bench_parse(c: &mut Criterion) {
    let text = build_file(500).to_reg_string();
    c.bench_function("parse 500 keys", |b| {
        b.iter(|| RegistryFile::parse(black_box(&text)).unwrap())
    });
}

criterion_group!(benches, bench_parse, bench_serialize);
criterion_main!(benches);
