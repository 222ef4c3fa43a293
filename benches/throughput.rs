use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use mcshim::intercept::{HandlerRegistry, KindFilter, KindTag, MessageClassifier, Verdict};
use mcshim::proxy::{Connection, ConnectionInfo, ConnectionProxy, ProxyDeps};
use mcshim::scheduler::DeferredTaskScheduler;
use mcshim_proto::{FieldAccessor, OutboundMessage, ProtocolVersion, tables};
use std::hint::black_box;
use std::sync::Arc;
use tokio::sync::mpsc;

// Measures the per-message cost a proxy adds to the send path. Messages go
// to a bounded channel that is drained after every send.

fn classification_benchmark(c: &mut Criterion) {
    tables::init().expect("built-in tables");
    let acc = FieldAccessor::for_version(ProtocolVersion::V1_12_R1).expect("table present");
    let classifier = MessageClassifier::default();
    let chat = acc.chat(r#"{"text":"Hello world"}"#, 0);
    let keep_alive = OutboundMessage::new(ProtocolVersion::V1_12_R1, 0x1F, &[0u8; 8][..]);

    let mut group = c.benchmark_group("classify");
    group.throughput(Throughput::Elements(1));
    group.bench_function("chat", |b| b.iter(|| classifier.classify_with(&acc, black_box(&chat))));
    group.bench_function("other", |b| {
        b.iter(|| classifier.classify_with(&acc, black_box(&keep_alive)))
    });
    group.finish();
}

fn proxy_benchmark(c: &mut Criterion) {
    tables::init().expect("built-in tables");
    let acc = FieldAccessor::for_version(ProtocolVersion::V1_12_R1).expect("table present");

    let registry = Arc::new(HandlerRegistry::new());
    registry.register("observer", KindFilter::Any, |ctx| Ok(ctx.allow()));
    registry.register("censor", KindFilter::only(KindTag::Chat), |ctx| {
        Ok(ctx.rewrite(|acc, msg| acc.write_plain_text(msg, "***"))?)
    });
    registry.register("never", KindFilter::only(KindTag::SetSlot), |_| Ok(Verdict::Suppress));

    let (scheduler, _driver) = DeferredTaskScheduler::new();
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(1024);
    let info = ConnectionInfo::new(1, ProtocolVersion::V1_12_R1, uuid::Uuid::nil(), "Bench");
    let conn = Connection::new(info, Arc::new(tx));
    ConnectionProxy::install(&conn, ProxyDeps::new(registry, scheduler)).expect("first install");

    let chat = acc.chat(r#"{"text":"Hello world"}"#, 0);
    let keep_alive = OutboundMessage::new(ProtocolVersion::V1_12_R1, 0x1F, &[0u8; 8][..]);

    let mut group = c.benchmark_group("proxy");
    group.throughput(Throughput::Elements(1));
    group.bench_function("forward_other", |b| {
        b.iter(|| {
            conn.send(keep_alive.clone()).expect("queue drained");
            black_box(rx.try_recv().expect("forwarded"))
        })
    });
    group.bench_function("rewrite_chat", |b| {
        b.iter(|| {
            conn.send(chat.clone()).expect("queue drained");
            black_box(rx.try_recv().expect("forwarded"))
        })
    });
    group.finish();
}

criterion_group!(benches, classification_benchmark, proxy_benchmark);
criterion_main!(benches);
