//! 지문 계산 벤치마크
//!
//! 속성 수에 따른 지문 계산 및 이벤트 직렬화 비용을 측정합니다.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use hivewatch_core::event::{AttackEvent, AttackKind, Attributes};
use hivewatch_core::fingerprint::fingerprint;

fn login_attributes() -> Attributes {
    Attributes::new()
        .with(Attributes::USERNAME, "admin")
        .with(Attributes::PASSWORD, "admin123")
        .with(Attributes::PROTOCOL, "ssh")
}

fn web_attributes() -> Attributes {
    Attributes::new()
        .with(Attributes::PATH, "/wp-login.php?user=admin")
        .with(Attributes::PROTOCOL, "http")
        .with(
            Attributes::RAW_LOG,
            "172.17.0.1 - - [10/Oct/2025:13:55:36 +0000] \"GET /wp-login.php?user=admin HTTP/1.1\" 404 153",
        )
}

fn bench_fingerprint(c: &mut Criterion) {
    let login = login_attributes();
    let web = web_attributes();

    let mut group = c.benchmark_group("fingerprint");
    group.throughput(Throughput::Elements(1));

    group.bench_function("login_attempt", |b| {
        b.iter(|| {
            fingerprint(
                black_box("hp-ssh-1"),
                black_box("203.0.113.7"),
                black_box(AttackKind::LOGIN_ATTEMPT),
                black_box(&login),
            )
        })
    });

    group.bench_function("http_request_with_raw_log", |b| {
        b.iter(|| {
            fingerprint(
                black_box("hp-web-1"),
                black_box("172.17.0.1"),
                black_box(AttackKind::HTTP_REQUEST),
                black_box(&web),
            )
        })
    });

    group.finish();
}

fn bench_event_serialization(c: &mut Criterion) {
    let mut event = AttackEvent::new(
        "hp-ssh-1",
        "203.0.113.7",
        AttackKind::LOGIN_ATTEMPT,
        login_attributes(),
    );
    event.ensure_fingerprint();

    let mut group = c.benchmark_group("event_serialization");
    group.bench_function("to_json", |b| {
        b.iter(|| serde_json::to_string(black_box(&event)))
    });
    group.finish();
}

criterion_group!(benches, bench_fingerprint, bench_event_serialization);
criterion_main!(benches);
