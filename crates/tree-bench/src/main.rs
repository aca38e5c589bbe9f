//! Search benchmark over synthetic game trees
//!
//! Decides the opening choice of randomly seeded synthetic games with every
//! search configuration and checks that they agree on the answer and value.
//! Reports evaluation counts and timings per configuration.

use std::time::{Duration, Instant};

use choice_search::search::{
    AiResult, CancellationToken, DriverKind, MinMaxPartitioner, ResultSource, Scoring,
    SearchConfig,
};
use choice_search::synthetic::{SyntheticAlgorithm, SyntheticGame, TreeShape};
use choice_search::{Result, Score};
use clap::Parser;
use colored::*;
use num_format::{Locale, ToFormattedString};
use rand::Rng;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// One search configuration under test
struct Variant {
    name: &'static str,
    config: SearchConfig,
}

fn variants(args: &Args) -> Vec<Variant> {
    let base = |scoring| {
        SearchConfig::new(scoring)
            .with_threads(args.threads)
            .with_transposition_table(true, Some(args.hash_size as usize))
    };
    vec![
        Variant {
            name: "negamax+tt/iterative",
            config: base(Scoring::Negamax).with_driver(DriverKind::Iterative),
        },
        Variant {
            name: "negamax+tt/recursive",
            config: base(Scoring::Negamax).with_driver(DriverKind::Recursive),
        },
        Variant {
            name: "negamax/iterative",
            config: base(Scoring::Negamax).with_transposition_table(false, None),
        },
        Variant {
            name: "minimax/iterative",
            config: base(Scoring::Minimax),
        },
        Variant {
            name: "minimax/full-width",
            config: base(Scoring::Minimax).with_pruning(false),
        },
    ]
}

/// Totals of one variant across all runs
#[derive(Default)]
struct VariantStats {
    time: Duration,
    evaluations: u64,
    disagreements: usize,
}

fn per_second(count: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (count as f64 / secs).round() as u64
    } else {
        0
    }
}

fn format_score(score: Option<Score>) -> String {
    score.map_or_else(|| "-".to_string(), |score| format!("{score:.1}"))
}

fn print_header() {
    println!(
        "| {:^3} | {:<20} | {:^6} | {:^8} | {:^12} | {:^9} | {:^12} | {:^5} |",
        "#", "Config", "Answer", "Score", "Evaluations", "Time(ms)", "Evals/s", "Agree"
    );
    println!(concat!(
        "|----:|:---------------------|-------:|---------:",
        "|-------------:|----------:|-------------:|:-----:|"
    ));
}

fn print_row(
    run: u64,
    variant: &Variant,
    result: &AiResult<u32>,
    elapsed: Duration,
    agrees: bool,
) {
    let answer = match result.source {
        ResultSource::Searched | ResultSource::SingleCandidate => result.answer.to_string(),
        _ => format!("{}*", result.answer),
    };
    let agree = if agrees { "yes".bright_green() } else { "NO".bright_red() };
    println!(
        "| {:>3} | {:<20} | {:>6} | {:>8} | {:>12} | {:>9.2} | {:>12} | {:^5} |",
        run,
        variant.name,
        answer,
        format_score(result.score),
        result.evaluations.to_formatted_string(&Locale::en),
        elapsed.as_secs_f64() * 1000.0,
        per_second(result.evaluations, elapsed).to_formatted_string(&Locale::en),
        agree
    );
}

fn print_statistics(variants: &[Variant], stats: &[VariantStats], runs: u64) {
    let max_label_len = variants.iter().map(|v| v.name.len()).max().unwrap_or(0);
    println!("\n### Statistics ({runs} runs):");
    for (variant, stats) in variants.iter().zip(stats) {
        let summary = format!(
            "{} evaluations, {:.2}ms, {} evals/s",
            stats.evaluations.to_formatted_string(&Locale::en),
            stats.time.as_secs_f64() * 1000.0,
            per_second(stats.evaluations, stats.time).to_formatted_string(&Locale::en),
        );
        let verdict = if stats.disagreements == 0 {
            "ok".bright_green()
        } else {
            format!("{} disagreements", stats.disagreements).bright_red()
        };
        println!("- {:<max_label_len$}: {summary} [{verdict}]", variant.name);
    }
}

fn decide(shape: &TreeShape, config: &SearchConfig) -> Result<(AiResult<u32>, Duration)> {
    let (game, sequencer) = SyntheticGame::start(shape.clone());
    let Some(choice) = sequencer.pending_choice() else {
        return Ok((AiResult::fallback(0, ResultSource::Default), Duration::ZERO));
    };
    let candidates = (0..choice.width()).collect();
    let mut partitioner = MinMaxPartitioner::new(
        &game,
        SyntheticAlgorithm::new(0),
        SyntheticGame::enumerators(),
        config.clone(),
    );

    let start = Instant::now();
    let cancel = CancellationToken::new();
    let result = partitioner.execute(&game, &sequencer, &choice, candidates, &cancel)?;
    Ok((result, start.elapsed()))
}

fn execute(args: &Args) -> Result<usize> {
    let variants = variants(args);
    let mut stats: Vec<VariantStats> = variants.iter().map(|_| VariantStats::default()).collect();
    let mut rng = rand::rng();

    print_header();
    for run in 1..=args.runs {
        let seed = match args.seed {
            Some(seed) => seed.wrapping_add(run - 1),
            None => rng.random(),
        };
        let shape = TreeShape {
            depth: args.depth,
            branching: args.branching,
            seed,
            dead_end_percent: args.dead_ends,
            forced_percent: args.forced,
            ..TreeShape::default()
        };
        tracing::info!(run, seed, "searching synthetic tree");

        let mut reference: Option<(u32, Option<Score>)> = None;
        for (variant, stats) in variants.iter().zip(stats.iter_mut()) {
            let (result, elapsed) = decide(&shape, &variant.config)?;
            let verdict = (result.answer, result.score);
            let agrees = *reference.get_or_insert(verdict) == verdict;
            if !agrees {
                tracing::warn!(
                    run,
                    seed,
                    variant = variant.name,
                    ?verdict,
                    ?reference,
                    "verdicts differ"
                );
                stats.disagreements += 1;
            }
            stats.time += elapsed;
            stats.evaluations += result.evaluations;
            print_row(run, variant, &result, elapsed, agrees);
        }
    }

    print_statistics(&variants, &stats, args.runs);
    Ok(stats.iter().map(|stats| stats.disagreements).sum())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Command line arguments for the synthetic tree benchmark
#[derive(Parser)]
#[command(author, version, about = "Decision search benchmark over synthetic game trees")]
struct Args {
    /// Decisions until a synthetic game ends
    #[arg(short, long, default_value = "6", value_parser = clap::value_parser!(u32).range(1..=12))]
    depth: u32,

    /// Width of a regular choice
    #[arg(short, long, default_value = "4", value_parser = clap::value_parser!(u32).range(1..=16))]
    branching: u32,

    /// Seed of the first run; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Number of synthetic games to search
    #[arg(short, long, default_value = "3", value_parser = clap::value_parser!(u64).range(1..))]
    runs: u64,

    /// Percentage of turns without a legal answer
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u8).range(0..=100))]
    dead_ends: u8,

    /// Percentage of turns with a single legal answer
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u8).range(0..=100))]
    forced: u8,

    /// Transposition table size in MB
    #[arg(long, default_value = "1")]
    hash_size: u16,

    /// Number of worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Log search progress
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    match execute(&args) {
        Ok(0) => {}
        Ok(disagreements) => {
            eprintln!("Error: {disagreements} verdicts differ from the reference configuration");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
