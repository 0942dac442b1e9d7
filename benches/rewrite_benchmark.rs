use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flagfold::config::BitArgumentFunction;
use flagfold::{rewrite_expression, ConvertOptions, Converter, FlagSet, SourceDocument};

fn rewrite_benchmark(c: &mut Criterion) {
    let declaration = std::fs::read_to_string("data/access_flags.cs").unwrap();
    let source = std::fs::read_to_string("data/Policies.cs").unwrap();
    let flag_set = FlagSet::build(&declaration).unwrap();
    let mut options = ConvertOptions::default();
    options
        .bit_argument_functions
        .push("SetBit:1".parse::<BitArgumentFunction>().unwrap());

    c.bench_function("flag_set_resolve", |b| {
        b.iter(|| {
            for n in 0..64 {
                black_box(flag_set.resolve_text(black_box(n)));
            }
        });
    });

    c.bench_function("rewrite_has_flag_expression", |b| {
        b.iter(|| {
            black_box(rewrite_expression(&flag_set, "((int)x & 6) == 0", Some("x"), true, &options).unwrap());
        });
    });

    let documents = vec![SourceDocument::new("Policies.cs", source)];
    c.bench_function("convert_document", |b| {
        b.iter(|| {
            let mut converter = Converter::new(options.clone());
            black_box(converter.run(&declaration, &documents).unwrap());
        });
    });
}

criterion_group!(benches, rewrite_benchmark);
criterion_main!(benches);
