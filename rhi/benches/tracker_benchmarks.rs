use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use redlilium_rhi::{
    Barrier, BarrierTracker, BufferDescriptor, BufferInfo, BufferUsage, DeviceParameters,
    GraphicsDevice, HazardPolicy, PipelineStage, ResourceAccess, TextureDescriptor, TextureFormat,
    TextureState, TextureUsage, TextureView, TextureViewDescriptor,
};

fn bench_device(policy: HazardPolicy) -> Arc<GraphicsDevice> {
    GraphicsDevice::new(DeviceParameters::new().with_hazard_policy(policy)).unwrap()
}

fn bench_ranges(device: &Arc<GraphicsDevice>, count: usize) -> Vec<BufferInfo> {
    (0..count)
        .map(|_| {
            BufferInfo::whole(
                device
                    .create_buffer(&BufferDescriptor::new(
                        1024,
                        BufferUsage::COPY_SRC | BufferUsage::COPY_DST | BufferUsage::STORAGE,
                    ))
                    .unwrap(),
            )
        })
        .collect()
}

fn bench_views(device: &Arc<GraphicsDevice>, count: usize) -> Vec<Arc<TextureView>> {
    (0..count)
        .map(|_| {
            device
                .create_texture(&TextureDescriptor::new_2d(
                    256,
                    256,
                    TextureFormat::Rgba8Unorm,
                    TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
                ))
                .unwrap()
                .create_view(&TextureViewDescriptor::new())
                .unwrap()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tracker in isolation
// ---------------------------------------------------------------------------

fn bench_tracker_repeated_buffer_access(c: &mut Criterion) {
    let device = bench_device(HazardPolicy::ExactMatch);
    let ranges = bench_ranges(&device, 64);

    c.bench_function("tracker_64_ranges_x4_accesses", |b| {
        b.iter_batched(
            || (BarrierTracker::new(HazardPolicy::ExactMatch), Vec::<Barrier>::new()),
            |(mut tracker, mut barriers)| {
                for _ in 0..4 {
                    for range in &ranges {
                        tracker.record_buffer_barrier(
                            &mut barriers,
                            range,
                            PipelineStage::TRANSFER,
                            ResourceAccess::WriteOnly,
                        );
                    }
                }
                black_box(barriers.len());
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_tracker_texture_ping_pong(c: &mut Criterion) {
    let device = bench_device(HazardPolicy::AnyPriorAccess);
    let views = bench_views(&device, 16);

    c.bench_function("tracker_16_textures_ping_pong", |b| {
        b.iter_batched(
            || (BarrierTracker::new(HazardPolicy::AnyPriorAccess), Vec::<Barrier>::new()),
            |(mut tracker, mut barriers)| {
                for step in 0..8 {
                    let (state, access) = if step % 2 == 0 {
                        (TextureState::StorageBinding, ResourceAccess::WriteOnly)
                    } else {
                        (TextureState::SampledBinding, ResourceAccess::ReadOnly)
                    };
                    for view in &views {
                        tracker.record_texture_barrier(
                            &mut barriers,
                            view,
                            state,
                            PipelineStage::COMPUTE,
                            access,
                        );
                    }
                }
                black_box(barriers.len());
            },
            BatchSize::SmallInput,
        );
    });
}

// ---------------------------------------------------------------------------
// Full encoder finish on the dummy backend
// ---------------------------------------------------------------------------

fn bench_encoder_finish_copies(c: &mut Criterion) {
    let device = bench_device(HazardPolicy::ExactMatch);
    let ranges = bench_ranges(&device, 32);

    c.bench_function("encoder_finish_256_copies", |b| {
        b.iter_batched(
            || {
                let mut encoder = device.create_command_encoder(None).unwrap();
                for i in 0..256 {
                    let src = ranges[i % ranges.len()].clone();
                    let dst = ranges[(i + 1) % ranges.len()].clone();
                    encoder.copy_buffer_to_buffer(src, dst).unwrap();
                }
                encoder
            },
            |mut encoder| black_box(encoder.finish().unwrap()),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_tracker_repeated_buffer_access,
    bench_tracker_texture_ping_pong,
    bench_encoder_finish_copies,
);
criterion_main!(benches);
