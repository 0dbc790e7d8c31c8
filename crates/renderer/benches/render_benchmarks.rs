//! Benchmarks for the renderer crate - colorizing, compositing and bitmap encoding.
//!
//! Run with: cargo bench --package renderer --bench render_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use renderer::{
    colorize, compress, encode_bmp_v4, Canvas, ColorRamp, CompositeLayer, KeyColor, LayerKind,
    LayerStack, Rgb,
};

/// Device sizes at the small and large end of a typical batch.
const SIZES: [(u32, u32); 2] = [(660, 330), (2640, 1320)];

const AURORA_RAMP: &str = "\
0 0/0/0 2 0/80/0
2 0/80/0 5 0/255/0
5 0/255/0 8 255/255/0
8 255/255/0 10 255/0/0
N 0/0/0
";

/// Auroral-oval-like canvas values: a band near the top and bottom with noise,
/// no-data elsewhere.
fn generate_values(width: u32, height: u32) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    let mut data = vec![f32::NAN; (width * height) as usize];
    for y in 0..height {
        let lat = 90.0 - (y as f32 + 0.5) * 180.0 / height as f32;
        let band = 1.0 - ((lat.abs() - 67.0).abs() / 10.0);
        if band <= 0.0 {
            continue;
        }
        for x in 0..width {
            let noise: f32 = rng.gen_range(-0.5..0.5);
            data[(y * width + x) as usize] = (band * 10.0 + noise).max(0.0);
        }
    }
    data
}

/// Ink-on-white grid lines every 30 pixels.
fn generate_linework(width: u32, height: u32) -> Canvas {
    let mut canvas = Canvas::new(width, height, Rgb::WHITE);
    for y in 0..height {
        for x in 0..width {
            if x % 30 == 0 || y % 30 == 0 {
                canvas.put(x, y, Rgb::BLACK);
            }
        }
    }
    canvas
}

fn bench_colorize(c: &mut Criterion) {
    let mut group = c.benchmark_group("colorize");
    let ramp = ColorRamp::parse(AURORA_RAMP).expect("ramp");

    for (width, height) in SIZES {
        let values = generate_values(width, height);
        group.throughput(Throughput::Elements((width * height) as u64));
        group.bench_with_input(
            BenchmarkId::new("aurora", format!("{}x{}", width, height)),
            &values,
            |b, values| {
                b.iter(|| colorize(black_box(values), width, height, &ramp));
            },
        );
    }

    group.finish();
}

fn bench_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite");
    let ramp = ColorRamp::parse(AURORA_RAMP).expect("ramp");

    for (width, height) in SIZES {
        let data = colorize(&generate_values(width, height), width, height, &ramp).expect("colorize");
        let stack = LayerStack::new(width, height)
            .with(CompositeLayer::solid_base(width, height, Rgb::new(0, 0, 60)))
            .with(CompositeLayer::new(LayerKind::Data, data).with_key(KeyColor::exact(ramp.no_data())))
            .with(CompositeLayer::haze(width, height, Rgb::new(120, 120, 120), 0.2))
            .with(CompositeLayer::linework(
                generate_linework(width, height),
                KeyColor::new(Rgb::BLACK, 24),
                true,
            ));

        group.throughput(Throughput::Elements((width * height) as u64));
        group.bench_with_input(
            BenchmarkId::new("day_stack", format!("{}x{}", width, height)),
            &stack,
            |b, stack| {
                b.iter(|| black_box(stack).render());
            },
        );
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let ramp = ColorRamp::parse(AURORA_RAMP).expect("ramp");

    for (width, height) in SIZES {
        let canvas = colorize(&generate_values(width, height), width, height, &ramp).expect("colorize");
        let bitmap = encode_bmp_v4(&canvas).expect("encode");

        group.throughput(Throughput::Bytes(bitmap.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("bmp_v4", format!("{}x{}", width, height)),
            &canvas,
            |b, canvas| {
                b.iter(|| encode_bmp_v4(black_box(canvas)));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("zlib_best", format!("{}x{}", width, height)),
            &bitmap,
            |b, bitmap| {
                b.iter(|| compress(black_box(bitmap)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_colorize, bench_composite, bench_encode);
criterion_main!(benches);
