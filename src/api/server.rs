use crate::api::dto::{AnalysisRequest, SolveRequest};
use crate::application::solver;
use crate::application::AnalyzeUsecase;
use crate::infrastructure::{JsonReportExporter, LineNormalizer};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

#[derive(Debug, Deserialize)]
struct CommandReq {
    command: String,
    params: Option<serde_json::Value>,
}

pub fn start_server(port: u16) -> Result<()> {
    let address = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&address)
        .with_context(|| format!("Failed to bind to {}", address))?;

    println!("[costscope] API Server listening on {}", address);

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream) {
                        eprintln!("[API] Connection error: {}", e);
                    }
                });
            }
            Err(e) => eprintln!("[API] Accept error: {}", e),
        }
    }

    Ok(())
}

fn handle_connection(mut stream: TcpStream) -> Result<()> {
    // Clone stream for reading/writing
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            break; // Connection closed
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match process_command(trimmed) {
            Ok(data) => json!({
                "status": "success",
                "data": data
            }),
            Err(e) => json!({
                "status": "error",
                "message": e.to_string()
            }),
        };

        let response_str = serde_json::to_string(&response)?;
        stream.write_all(response_str.as_bytes())?;
        stream.write_all(b"\n")?;

        // The reply goes out before the process terminates.
        if let Ok(req) = serde_json::from_str::<CommandReq>(trimmed) {
            if req.command == "SHUTDOWN" {
                println!("[API] Shutdown requested.");
                std::process::exit(0);
            }
        }
    }
    Ok(())
}

fn process_command(json_str: &str) -> Result<serde_json::Value> {
    let req: CommandReq = serde_json::from_str(json_str)
        .context("Invalid JSON format")?;

    match req.command.as_str() {
        "PING" => Ok(json!("PONG")),
        "ANALYZE" => handle_analyze(req.params),
        "SOLVE" => handle_solve(req.params),
        "SHUTDOWN" => Ok(json!("Shutting down...")),
        _ => anyhow::bail!("Unknown command: {}", req.command),
    }
}

fn handle_analyze(params: Option<serde_json::Value>) -> Result<serde_json::Value> {
    let params = params.ok_or_else(|| anyhow::anyhow!("Missing params for ANALYZE"))?;
    let req: AnalysisRequest =
        serde_json::from_value(params).context("Invalid ANALYZE params")?;

    println!(
        "[API] Analyzing {} function(s)",
        req.ast.functions.len()
    );

    let validator = LineNormalizer::default();
    let exporter = JsonReportExporter;
    let usecase = AnalyzeUsecase {
        validator: &validator,
        exporter: &exporter,
    };

    let config = req.config.unwrap_or_default();
    let report = usecase.analyze(&req.ast, &req.source, &config, req.steps);

    Ok(serde_json::to_value(report)?)
}

fn handle_solve(params: Option<serde_json::Value>) -> Result<serde_json::Value> {
    let params = params.ok_or_else(|| anyhow::anyhow!("Missing params for SOLVE"))?;
    let req: SolveRequest = serde_json::from_value(params).context("Invalid SOLVE params")?;

    let solution = solver::solve(&req.total, &req.lines, req.steps);

    Ok(serde_json::to_value(solution)?)
}
