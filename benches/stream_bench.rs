use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::RngCore;
use ztream::codec::Deflater;
use ztream::{Options, Stream};

fn random(len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut out);
    out
}

fn bench_encode(c: &mut Criterion) {
    let text: Vec<u8> = b"lorem ipsum dolor sit amet ".iter().copied().cycle().take(256 * 1024).collect();
    let noise = random(256 * 1024);
    let mut deflater = Deflater::with_params(1, 4096, 0.75);

    c.bench_function("encode_256k_text", |b| b.iter(|| deflater.encode(black_box(&text)).unwrap().len()));
    c.bench_function("encode_256k_random", |b| b.iter(|| deflater.encode(black_box(&noise)).unwrap().len()));
}

fn bench_append_sync(c: &mut Criterion) {
    let data = random(16 * 1024);

    c.bench_function("append_64x16k_sync_close", |b| {
        b.iter(|| {
            let dir = tempfile::tempdir().unwrap();
            let opts = Options { file_size: Some(4 << 20), ..Options::default() };
            let mut stream = Stream::create(dir.path().join("bench.zip"), opts).unwrap();
            for i in 0..64 {
                stream.append(&format!("blob_{i}"), black_box(&data)).unwrap();
            }
            stream.sync().unwrap();
            stream.close().unwrap();
        })
    });
}

fn bench_read(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let text: Vec<u8> = b"0123456789abcdef".iter().copied().cycle().take(64 * 1024).collect();
    let mut stream = Stream::create(dir.path().join("read.zip"), Options::default()).unwrap();
    let deflated = stream.append("text", &text).unwrap();
    let stored = stream.append("noise", &random(64 * 1024)).unwrap();
    stream.sync().unwrap();

    let mut buf = vec![0u8; 64 * 1024];
    c.bench_function("read_64k_deflated", |b| b.iter(|| stream.read(black_box(&deflated), &mut buf).unwrap()));
    c.bench_function("read_64k_stored", |b| b.iter(|| stream.read(black_box(&stored), &mut buf).unwrap()));
}

fn bench_open_scan(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.zip");
    let mut stream = Stream::create(&path, Options::default()).unwrap();
    for i in 0..1000 {
        stream.append(&format!("entry_{i:04}"), &random(512)).unwrap();
    }
    stream.sync().unwrap();
    stream.close().unwrap();

    c.bench_function("open_scan_1000_entries", |b| {
        b.iter(|| {
            let mut stream = Stream::open(&path, Options::default()).unwrap();
            stream.contents().unwrap().len()
        })
    });
}

criterion_group!(benches, bench_encode, bench_append_sync, bench_read, bench_open_scan);
criterion_main!(benches);
