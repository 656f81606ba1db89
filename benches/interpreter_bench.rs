use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use minilisp::{evaluate, make_initial_frame, parse_all, parse_str, run, tokenize};

// A reasonably complex input string for benchmarking
const BENCH_INPUT: &str = r#"
(define (fib n)
  ; Calculate the nth Fibonacci number
  (if (< n 2)
      n
      (+ (fib (- n 1))
         (fib (- n 2)))))

(define (factorial n)
  (if (equal? n 0)
      1
      (* n (factorial (- n 1)))))

(define (map f xs)
  (if (equal? xs nil)
      nil
      (cons (f (car xs)) (map f (cdr xs)))))

; Some calls
(fib 10)
(factorial 5)
(map (lambda (x) (* x x)) (list 1 2 3 4.5 -10))
(and (< 1 2 3) (or #f (>= 3 3)))
"#;

fn bench_front_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("Front end");

    group.bench_with_input(
        BenchmarkId::new("tokenize", "program"),
        &BENCH_INPUT,
        |b, input| b.iter(|| tokenize(black_box(input))),
    );
    group.bench_with_input(
        BenchmarkId::new("parse_all", "program"),
        &BENCH_INPUT,
        |b, input| b.iter(|| parse_all(black_box(input))),
    );

    group.finish();
}

fn bench_evaluator(c: &mut Criterion) {
    let mut group = c.benchmark_group("Evaluator");

    group.bench_function(BenchmarkId::new("run", "program"), |b| {
        b.iter(|| {
            let env = make_initial_frame();
            run(black_box(BENCH_INPUT), &env)
        })
    });

    for n in [10i64, 15] {
        let env = make_initial_frame();
        if let Err(err) = run(BENCH_INPUT, &env) {
            panic!("benchmark program failed: {}", err);
        }
        let call = match parse_str(&format!("(fib {})", n)) {
            Ok(node) => node,
            Err(err) => panic!("benchmark call failed to parse: {}", err),
        };
        group.bench_with_input(BenchmarkId::new("fib", n), &call, |b, call| {
            b.iter(|| evaluate(black_box(call), env.clone()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_front_end, bench_evaluator);
criterion_main!(benches);
