// Command-line entry point for costscope.

use clap::Parser;
use costscope::api::dto::AnalysisRequest;
use costscope::application::analyzer::{AnalyzerConfig, IncrementStyle};
use costscope::application::AnalyzeUsecase;
use costscope::infrastructure::{concurrency, JsonReportExporter, LineNormalizer};
use costscope::ports::text_report::TextReportRenderer;
use costscope::ports::ReportExporter;
use rayon::prelude::*;
use std::fs;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input request file path (can specify multiple)
    #[arg(short, long, required = false)]
    input: Vec<String>,

    /// Output file path (with multiple inputs, the input stem is appended)
    #[arg(short, long, required = false)]
    output: Option<String>,

    /// Output format (json, text)
    #[arg(short, long, default_value = "json")]
    format: String,

    /// Run as a TCP API server on the given port instead of batch mode
    #[arg(long)]
    serve: Option<u16>,

    /// Charge for-loop bookkeeping (header evaluations and increments)
    #[arg(long)]
    count_loop_control: bool,

    /// Increment accounting (unit, expanded)
    #[arg(long, default_value = "unit")]
    increment_style: String,

    /// Probability that an if-branch is taken, used for average case
    #[arg(long, default_value_t = 0.5)]
    branch_probability: f64,

    /// Skip derivation steps in the report
    #[arg(long)]
    no_steps: bool,
}

fn build_config(cli: &Cli) -> AnalyzerConfig {
    let increment_style = match cli.increment_style.as_str() {
        "expanded" => IncrementStyle::Expanded,
        _ => IncrementStyle::Unit,
    };
    AnalyzerConfig {
        count_loop_control: cli.count_loop_control,
        increment_style,
        default_branch_probability: cli.branch_probability,
    }
}

/// With a single input the output path is used as-is; with several, each
/// report goes to `<output_stem>_<input_stem>.<output_ext>`.
fn output_path_for(output: &str, input: &str, many: bool) -> String {
    if !many {
        return output.to_string();
    }
    let out = Path::new(output);
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "report".to_string());
    let ext = out
        .extension()
        .map(|s| format!(".{}", s.to_string_lossy()))
        .unwrap_or_default();
    let name = Path::new(input)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input".to_string());
    out.with_file_name(format!("{}_{}{}", stem, name, ext))
        .to_string_lossy()
        .to_string()
}

fn analyze_file(cli: &Cli, input: &str, out_path: &str) -> anyhow::Result<()> {
    let raw = fs::read_to_string(input)
        .map_err(|e| anyhow::anyhow!("Cannot read input file {}: {}", input, e))?;
    let request: AnalysisRequest = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid request document {}: {}", input, e))?;

    let validator = LineNormalizer::default();
    let json_exporter = JsonReportExporter;
    let text_exporter = TextReportRenderer;
    let exporter: &dyn ReportExporter = match cli.format.as_str() {
        "text" => &text_exporter,
        _ => &json_exporter,
    };
    let usecase = AnalyzeUsecase {
        validator: &validator,
        exporter,
    };

    let config = request.config.unwrap_or_else(|| build_config(cli));
    let show_steps = !cli.no_steps && request.steps;
    usecase.run(&request.ast, &request.source, &config, show_steps, out_path)
}

fn main() {
    let cli = Cli::parse();

    if let Some(port) = cli.serve {
        if let Err(e) = costscope::api::server::start_server(port) {
            eprintln!("[costscope] Server error: {:?}", e);
            std::process::exit(1);
        }
        return;
    }

    if cli.input.is_empty() {
        eprintln!("Please provide at least one --input <file>, or --serve <port>");
        std::process::exit(2);
    }
    let output = match &cli.output {
        Some(o) => o.clone(),
        None => {
            eprintln!("Batch mode requires --output <file>");
            std::process::exit(2);
        }
    };

    if let Err(e) = concurrency::init_thread_pool() {
        eprintln!("[costscope] Thread pool init failed: {:?}", e);
    }

    let many = cli.input.len() > 1;
    let results: Vec<(String, anyhow::Result<String>)> = cli
        .input
        .par_iter()
        .map(|input| {
            let out_path = output_path_for(&output, input, many);
            let outcome = analyze_file(&cli, input, &out_path).map(|_| out_path);
            (input.clone(), outcome)
        })
        .collect();

    let mut failures = 0;
    for (input, outcome) in results {
        match outcome {
            Ok(out_path) => println!(
                "[costscope] {} analyzed, report written to {} (format: {})",
                input, out_path, cli.format
            ),
            Err(e) => {
                failures += 1;
                eprintln!("[costscope] {} failed: {:?}", input, e);
            }
        }
    }
    if failures > 0 {
        std::process::exit(1);
    }
}
