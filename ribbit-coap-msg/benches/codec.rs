use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use ribbit_coap_msg::*;

#[derive(Debug)]
struct Input {
  token: bool,
  n_opts: usize,
  opt_size: usize,
  payload_size: usize,
}

impl Input {
  fn packet(&self) -> Packet {
    let mut packet = Packet::new(Type::Non, Code::CONTENT);
    packet.id = Id(1);
    packet.token = Some(Token(0xCAFE_0001)).filter(|_| self.token);
    packet.opts = (0..self.n_opts).map(|n| Opt { number: OptNumber(1 + n as u32 * 3),
                                                 value: OptValue(vec![1; self.opt_size]) })
                                  .collect();
    packet.payload = Payload(vec![1; self.payload_size]);
    packet
  }

  fn bytes(&self) -> Vec<u8> {
    self.packet().try_into_bytes().unwrap()
  }
}

const INPUTS: [Input; 5] = [Input { token: false,
                                    n_opts: 0,
                                    opt_size: 0,
                                    payload_size: 0 },
                            Input { token: true,
                                    n_opts: 4,
                                    opt_size: 8,
                                    payload_size: 16 },
                            Input { token: true,
                                    n_opts: 8,
                                    opt_size: 32,
                                    payload_size: 128 },
                            Input { token: true,
                                    n_opts: 10,
                                    opt_size: 64,
                                    payload_size: 512 },
                            Input { token: true,
                                    n_opts: 10,
                                    opt_size: 16,
                                    payload_size: 1024 }];

fn packet_to_bytes(c: &mut Criterion) {
  let mut group = c.benchmark_group("packet/to_bytes");
  group.measurement_time(std::time::Duration::from_secs(5));

  for inp in INPUTS.iter() {
    let size = inp.bytes().len();

    group.bench_with_input(BenchmarkId::new("ribbit_coap_msg/size", size), inp, |b, inp| {
           b.iter_batched(|| inp.packet(),
                          |p| p.try_into_bytes().unwrap(),
                          BatchSize::SmallInput)
         });

    let cl_packet = coap_lite::Packet::from_bytes(&inp.bytes()).unwrap();
    group.bench_with_input(BenchmarkId::new("coap_lite/size", size),
                           &cl_packet,
                           |b, p| b.iter(|| p.to_bytes()));
  }
  group.finish();
}

fn packet_from_bytes(c: &mut Criterion) {
  let mut group = c.benchmark_group("packet/from_bytes");
  group.measurement_time(std::time::Duration::from_secs(5));

  for inp in INPUTS.iter() {
    let bytes = inp.bytes();

    group.bench_with_input(BenchmarkId::new("ribbit_coap_msg/size", bytes.len()),
                           &bytes,
                           |b, bytes| b.iter(|| Packet::try_from_bytes(bytes).unwrap()));

    group.bench_with_input(BenchmarkId::new("coap_lite/size", bytes.len()),
                           &bytes,
                           |b, bytes| b.iter(|| coap_lite::Packet::from_bytes(bytes).unwrap()));
  }
  group.finish();
}

criterion_group!(benches, packet_to_bytes, packet_from_bytes);
criterion_main!(benches);
