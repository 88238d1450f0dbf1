use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use posture::{
    ArtifactBundle, Dataset, LabelMapping, LabeledSample, Mlp, ScalerParams, SensorReading, Trainer,
};

const LABELS: [&str; 5] = ["lean_back", "lean_forward", "lean_left", "lean_right", "straight"];

fn setup_benchmark_bundle(hidden: &[usize]) -> ArtifactBundle<Mlp> {
    let labels = LabelMapping::new(LABELS.iter().map(|s| s.to_string()).collect()).unwrap();
    let scaler = ScalerParams::new([500.0; 8], [200.0; 8]).unwrap();
    ArtifactBundle::new(scaler, labels, Mlp::new(8, hidden, LABELS.len(), 42).unwrap()).unwrap()
}

fn synthetic_dataset(per_class: usize) -> Dataset {
    let mut samples = Vec::with_capacity(per_class * LABELS.len());
    for (k, label) in LABELS.iter().enumerate() {
        for i in 0..per_class {
            let mut values = [0.0; 8];
            for (c, v) in values.iter_mut().enumerate() {
                *v = (k * 150 + c * 20 + i % 13) as f64;
            }
            samples.push(LabeledSample {
                reading: SensorReading::new(values),
                label: label.to_string(),
            });
        }
    }
    Dataset::new(samples)
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("Prediction");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let reading = SensorReading::new([512.0, 498.0, 530.0, 505.0, 470.0, 520.0, 515.0, 490.0]);
    for hidden in [vec![32; 5], vec![64, 64], vec![8]] {
        let bundle = setup_benchmark_bundle(&hidden);
        let id = BenchmarkId::new("transform_predict", format!("{:?}", hidden));
        group.bench_with_input(id, &reading, |b, r| {
            b.iter(|| bundle.predict(black_box(r)).unwrap())
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("Training");
    group.sample_size(10);

    let dataset = synthetic_dataset(200);
    let trainer = Trainer::builder().epochs(1).build().unwrap();
    group.bench_function("one_epoch_1000_samples", |b| {
        b.iter(|| trainer.fit(black_box(&dataset)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_prediction, bench_training);
criterion_main!(benches);
