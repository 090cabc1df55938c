use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ttyscribe_clean::clean;

/// A colored shell session, repeated until it reaches roughly `size` bytes.
fn shell_session(size: usize) -> Vec<u8> {
    let chunk: &[u8] = b"\x1b]0;user@host: ~/src\x07\x1b[01;32muser@host\x1b[00m:\x1b[01;34m~/src\x1b[00m$ cargo test\r\n\
        \x1b[0m\x1b[1m\x1b[32m   Compiling\x1b[0m ttyscribe v0.1.0\r\n\
        progress 10%\rprogress 55%\rprogress 100%\r\n\
        test result: \x1b[32mok\x1b[0m. 42 passed; 0 failed\r\n\r\n\r\n";
    chunk.iter().copied().cycle().take(size).collect()
}

/// Full-screen redraws: cursor addressing on every cell.
fn tui_redraw(size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(size);
    let mut row = 1;
    while out.len() < size {
        out.extend_from_slice(format!("\x1b[{row};1H\x1b[2K\x1b[7m status {row} \x1b[27m").as_bytes());
        row = row % 50 + 1;
    }
    out
}

/// Thousands of DCS introducers that are never terminated.
fn unterminated_dcs(size: usize) -> Vec<u8> {
    b"\x1bPq#0;2;0;0;0".iter().copied().cycle().take(size).collect()
}

fn bench_clean(c: &mut Criterion) {
    let mut group = c.benchmark_group("clean");

    for size in [4 * 1024, 64 * 1024, 1024 * 1024] {
        let inputs = [
            ("shell_session", shell_session(size)),
            ("tui_redraw", tui_redraw(size)),
            ("unterminated_dcs", unterminated_dcs(size)),
        ];

        group.throughput(Throughput::Bytes(size as u64));
        for (name, input) in inputs.iter() {
            group.bench_with_input(BenchmarkId::new(*name, size), input, |b, input| {
                b.iter(|| clean(black_box(input)))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_clean);
criterion_main!(benches);
