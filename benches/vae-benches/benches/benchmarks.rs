use candle_core::Device;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mnist_vae::learn::neural_network::Topology;
use num_format::{Locale, ToFormattedString};
use vae_benches::VaeStep;

pub fn criterion_benchmark(c: &mut Criterion) {
    let devices = if cfg!(feature = "cuda") {
        [Device::Cpu]
            .into_iter()
            .chain(Device::new_cuda(0).ok())
            .collect()
    } else {
        vec![Device::Cpu]
    };
    let topologies = [Topology::Conv, Topology::MaxPool];

    {
        // inference
        let batch_size = 1_000;
        let mut g = c.benchmark_group(format!(
            "Vae(inference, batch_size = {})",
            batch_size.to_formatted_string(&Locale::en)
        ));
        for device in devices.iter() {
            let device_name = if device.is_cpu() { "host" } else { "device" };
            for topology in topologies {
                let id = BenchmarkId::new(topology.to_string(), device_name);
                g.bench_function(id, |b| {
                    let mut step = VaeStep::new(device.clone(), topology, batch_size).unwrap();
                    b.iter(|| {
                        step.infer().unwrap();
                    });
                });
            }
        }
    }
    {
        // training
        let batch_size = 100;
        let mut g = c.benchmark_group(format!(
            "Vae(training, batch_size = {})",
            batch_size.to_formatted_string(&Locale::en)
        ));
        for device in devices.iter() {
            let device_name = if device.is_cpu() { "host" } else { "device" };
            for topology in topologies {
                let id = BenchmarkId::new(topology.to_string(), device_name);
                g.bench_function(id, |b| {
                    let mut step = VaeStep::new(device.clone(), topology, batch_size).unwrap();
                    b.iter(|| {
                        step.train().unwrap();
                    });
                });
            }
        }
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
