//! 분류기 벤치마크
//!
//! 프로토콜별 단일 라인 분류와 폴링 버퍼 전체 분류의 처리량을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use hivewatch_core::types::ProtocolKind;
use hivewatch_ingest::ClassifierSet;

const SSH_FAILED: &str =
    "2025-10-10T13:55:36+0000 [HoneyPotSSHTransport,1,203.0.113.7] login attempt [root/123456] failed";

const SSH_COWRIE_JSON: &str = r#"{"eventid":"cowrie.login.failed","username":"admin","password":"admin123","src_ip":"203.0.113.7","session":"a1b2c3","timestamp":"2025-10-10T13:55:36.123456Z"}"#;

const FTP_AUTH: &str = "Sat Oct 11 02:11:07 2025 [pid 42] [anonymous] FAIL LOGIN: Client \"198.51.100.23\" auth failed for user backup";

const WEB_SQLI: &str = "172.17.0.1 - - [10/Oct/2025:13:55:36 +0000] \"GET /item.php?id=1 UNION SELECT password FROM users HTTP/1.1\" 200 512";

/// 매칭되지 않는 라인 (모든 패턴을 거친 뒤 None)
const NOISE: &str = "2025-10-10T13:55:36+0000 [-] Reading configuration from cowrie.cfg";

fn bench_single_line(c: &mut Criterion) {
    let set = ClassifierSet::new().unwrap();

    let mut group = c.benchmark_group("classify_line");
    group.throughput(Throughput::Elements(1));

    for (name, kind, line) in [
        ("ssh_text", ProtocolKind::Ssh, SSH_FAILED),
        ("ssh_json", ProtocolKind::Ssh, SSH_COWRIE_JSON),
        ("ftp", ProtocolKind::Ftp, FTP_AUTH),
        ("web_sqli", ProtocolKind::Web, WEB_SQLI),
        ("ssh_noise", ProtocolKind::Ssh, NOISE),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &line, |b, line| {
            b.iter(|| set.classify_line(&kind, black_box("hp-1"), black_box(line)))
        });
    }

    group.finish();
}

fn bench_poll_buffer(c: &mut Criterion) {
    let set = ClassifierSet::new().unwrap();

    let mut group = c.benchmark_group("classify_buffer");
    for lines in [100usize, 1000] {
        let buffer: String = (0..lines)
            .map(|i| match i % 3 {
                0 => format!("login attempt [user{i}/pass{i}] failed\n"),
                1 => format!("New connection: 203.0.113.{}:{}\n", i % 255, 40000 + i),
                _ => format!("{NOISE}\n"),
            })
            .collect();

        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::new("ssh", lines), &buffer, |b, buffer| {
            b.iter(|| set.classify_buffer(&ProtocolKind::Ssh, "hp-1", black_box(buffer)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_line, bench_poll_buffer);
criterion_main!(benches);
