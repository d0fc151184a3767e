use std::hint::black_box;
use std::io::Write;
use std::sync::Arc;

use brrtbridge::api::{Config, Operation, ResponseRecorder};
use brrtbridge::engine::{App, EngineConfig, ParamVec, RadixTree};
use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;

const OPERATIONS: &[(Method, &str)] = &[
    (Method::GET, "/"),
    (Method::GET, "/zoo/animals"),
    (Method::POST, "/zoo/animals"),
    (Method::GET, "/zoo/animals/{id}"),
    (Method::PUT, "/zoo/animals/{id}"),
    (Method::DELETE, "/zoo/animals/{id}"),
    (Method::GET, "/zoo/animals/{id}/toys/{toy_id}"),
    (
        Method::GET,
        "/zoo/{category}/animals/{id}/habitats/{habitat_id}/sections/{section_id}",
    ),
    (
        Method::POST,
        "/inventory/{warehouse_id}/feeds/{feed_id}/items/{item_id}/batches/{batch_id}",
    ),
    (Method::GET, "/complex/{a}/{b}/{c}/{d}/{e}/{f}/{g}/{h}/{i}"),
];

const REQUESTS: &[(Method, &str)] = &[
    (Method::GET, "/zoo/animals/123"),
    (Method::GET, "/zoo/animals/123/toys/456"),
    (Method::GET, "/zoo/cats/animals/123/habitats/88/sections/5"),
    (Method::POST, "/inventory/1/feeds/2/items/3/batches/4"),
    (Method::GET, "/complex/1/2/3/4/5/6/7/8/9"),
];

fn bench_route_match(c: &mut Criterion) {
    let mut tree = RadixTree::default();
    for (i, (method, path)) in OPERATIONS.iter().enumerate() {
        tree.insert(
            method.clone(),
            &brrtbridge::adapter::rewrite_path(path),
            Arc::new(i),
        );
    }
    c.bench_function("route_match", |b| {
        let mut params = ParamVec::new();
        b.iter(|| {
            for (method, path) in REQUESTS {
                params.clear();
                black_box(tree.lookup(method, path, &mut params));
            }
        })
    });
}

fn bench_adapter_dispatch(c: &mut Criterion) {
    let app = App::new(EngineConfig::default());
    let api = brrtbridge::new(&app, Config::new("Verb Zoo", "1.0.0"));
    for (method, path) in OPERATIONS {
        api.register(Operation::new(method.clone(), *path), |ctx| {
            ctx.set_status(200);
            ctx.set_header("Content-Type", "text/plain");
            let tail = ctx.matched().rsplit('/').next().unwrap_or("").to_string();
            let _ = ctx.body_writer().write_all(tail.as_bytes());
        });
    }

    c.bench_function("adapter_dispatch", |b| {
        b.iter(|| {
            for (method, path) in REQUESTS {
                let req = http::Request::builder()
                    .method(method.clone())
                    .uri(*path)
                    .body(Vec::new())
                    .unwrap_or_default();
                let mut rec = ResponseRecorder::new();
                api.serve_http(&mut rec, req);
                black_box(rec.status());
            }
        })
    });
}

criterion_group!(benches, bench_route_match, bench_adapter_dispatch);
criterion_main!(benches);
