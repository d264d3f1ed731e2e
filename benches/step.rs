use criterion::{criterion_group, criterion_main, Criterion};
use particle_field::{
    config::FieldConfig,
    input::{InputAdapter, OrbitInput},
    render::Renderer,
    simulation::{FrameInput, Simulation},
};

fn step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step/cpu");

    for (width, height) in [(320, 180), (1280, 720)] {
        let config = FieldConfig {
            grid_width: width,
            grid_height: height,
            ..Default::default()
        };
        let mut sim = Simulation::new(&config).unwrap();
        let mut input = OrbitInput::new(sim.domain_bounds(), config.force_strength, 120);

        group.bench_function(format!("{width}x{height}/orbit"), |b| {
            b.iter(|| {
                sim.frame(&input.produce()).unwrap();
                std::hint::black_box(sim.current_generation().position.len());
            })
        });

        group.bench_function(format!("{width}x{height}/idle"), |b| {
            b.iter(|| {
                sim.frame(&FrameInput::idle()).unwrap();
                std::hint::black_box(sim.current_generation().position.len());
            })
        });
    }
    group.finish();
}

fn render(c: &mut Criterion) {
    let config = FieldConfig::default();
    let mut sim = Simulation::new(&config).unwrap();
    let mut input = OrbitInput::new(sim.domain_bounds(), config.force_strength, 120);
    for _ in 0..30 {
        sim.frame(&input.produce()).unwrap();
    }
    let renderer = Renderer::new(
        sim.particle_count(),
        sim.domain_bounds(),
        sim.domain_bounds(),
        config.style,
    );
    let mut points = Vec::new();

    c.bench_function("render/cpu/1280x720", |b| {
        b.iter(|| {
            renderer
                .render_into(&sim.current_generation(), &mut points)
                .unwrap();
            std::hint::black_box(&points);
        })
    });
}

criterion_group!(benches, step, render);
criterion_main!(benches);
