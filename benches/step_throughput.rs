use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use framestep::audio::framer::Framer;
use framestep::decode::{
    DecodeInstance, DecodeScheduler, EngineContext, FeatureFrame, FeatureStream,
    SchedulerOptions,
};
use framestep::endpoint::{EndpointProfile, EndpointSearch};
use std::hint::black_box;

/// Ten seconds of alternating 1s speech / 1s silence at 16kHz.
fn synthetic_frames() -> Vec<FeatureFrame> {
    let samples: Vec<i16> = (0..160_000)
        .map(|i| {
            let loud = (i / 16_000) % 2 == 0;
            let amplitude = if loud { 4000 } else { 0 };
            if i % 2 == 0 { amplitude } else { -amplitude }
        })
        .collect();
    Framer::default().frames(&samples)
}

/// Every instance on its own stream so stepping cost scales with the count.
fn build_context(frames: &[FeatureFrame], instances: usize) -> EngineContext {
    let mut ctx = EngineContext::new(SchedulerOptions::default());
    for index in 0..instances {
        let stream = ctx.add_stream(FeatureStream::with_frames(
            &format!("s{index}"),
            frames.to_vec(),
        ));
        if let Err(e) = ctx.add_instance(DecodeInstance::new(&format!("i{index}"), stream)) {
            panic!("failed to add instance: {e}");
        }
    }
    ctx
}

fn bench_run_to_completion(c: &mut Criterion) {
    let frames = synthetic_frames();
    // Never terminate so every frame is stepped.
    let profile = EndpointProfile {
        hangover_frames: usize::MAX,
        ..EndpointProfile::default()
    };

    let mut group = c.benchmark_group("run_to_completion");
    for instances in [1usize, 4, 16] {
        group.throughput(Throughput::Elements((frames.len() * instances) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(instances),
            &instances,
            |b, &instances| {
                b.iter_batched(
                    || {
                        (
                            build_context(&frames, instances),
                            DecodeScheduler::new(EndpointSearch::new(profile)),
                        )
                    },
                    |(mut ctx, mut scheduler)| {
                        let report = scheduler.run_to_completion(&mut ctx);
                        black_box(report.is_ok());
                    },
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }
    group.finish();
}

fn bench_framing(c: &mut Criterion) {
    let samples = vec![1000i16; 160_000];
    let framer = Framer::default();
    c.bench_function("frame_10s_pcm", |b| {
        b.iter(|| black_box(framer.frames(black_box(&samples))).len())
    });
}

criterion_group!(benches, bench_run_to_completion, bench_framing);
criterion_main!(benches);
