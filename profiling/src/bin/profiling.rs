use pii_eval::{align_samples, AliasMap, Evaluator, EvaluatorConfigBuilder, IdentityModel, InputSample};
use serde_jsonlines::json_lines;
use std::ops::Range;
use std::path::Path;
use std::time::{Duration, Instant};

use clap::Parser;

fn load_samples<P: AsRef<Path>>(path: P) -> Vec<InputSample> {
    json_lines::<InputSample, P>(path)
        .unwrap()
        .map(|r| r.unwrap())
        .collect::<Vec<_>>()
}

/// Repeats the documents of the dataset until `n_documents` documents are available.
fn repeat_samples(samples: &[InputSample], n_documents: usize) -> Vec<InputSample> {
    samples
        .iter()
        .cycle()
        .take(n_documents)
        .enumerate()
        .map(|(i, s)| s.clone().with_sample_id(i))
        .collect()
}

#[derive(Debug, Parser)]
struct Args {
    #[arg(short, long, default_value_t = 1)]
    n_samples: u32,
    #[arg(short, long, default_value_t=String::from("tests/data/samples.jsonl"))]
    dataset: String,
    #[arg(long, default_value_t = 100_000)]
    n_documents: usize,
    #[arg(short, long, default_value_t = false)]
    parallel: bool,
}

fn main() {
    let args = Args::parse();
    let n_samples = args.n_samples;
    let iter = Range {
        start: 0,
        end: n_samples,
    };
    let raw = load_samples(&args.dataset);
    let alignment = align_samples(&raw, &AliasMap::pii_defaults()).unwrap();
    let samples = repeat_samples(&alignment.samples, args.n_documents);
    let mut total_duration = Duration::ZERO;
    for _ in iter {
        let config = EvaluatorConfigBuilder::default()
            .parallel(args.parallel)
            .build();
        let evaluator = Evaluator::new(IdentityModel, config);
        let now = Instant::now();
        {
            let evaluation = evaluator.evaluate_all(&samples);
            evaluator.calculate_score(&evaluation).unwrap();
        }
        let elapsed = now.elapsed();
        total_duration += elapsed;
    }
    println!(
        "Total duration: {} with {n_samples} samples of {} documents",
        total_duration.as_secs_f64(),
        samples.len()
    )
}
