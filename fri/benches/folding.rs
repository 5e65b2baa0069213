use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use granite_fri::{compute_next_fri_layer, FftBases};
use math::fields::f128::BaseElement;
use math::FieldElement;
use rand_utils::{rand_value, rand_vector};

static BATCH_SIZES: [usize; 3] = [1 << 14, 1 << 16, 1 << 18];

fn fri_folding(c: &mut Criterion) {
    let mut group = c.benchmark_group("fold FRI layer");
    group.sample_size(10);

    for &size in BATCH_SIZES.iter() {
        let bases = FftBases::<BaseElement>::new(size.trailing_zeros() as usize, BaseElement::GENERATOR);
        let values: Vec<BaseElement> = rand_vector(size);
        let eval_point: BaseElement = rand_value();
        let mut output = vec![BaseElement::ZERO; size / 2];

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                compute_next_fri_layer(&bases, black_box(&values), eval_point, &mut output);
            });
        });
    }
    group.finish();
}

criterion_group!(fri_folding_group, fri_folding);
criterion_main!(fri_folding_group);
