//! haven-cli — command-line frontend for the Haven chat service
//!
//! Talks to the server's JSON API.
//!
//! # Subcommands
//! - `send <message> [--knowledge <text>] [--json]` — chat one turn
//! - `history [--json]`                             — print the transcript
//! - `report [--json]`                              — emotion counts
//! - `reset`                                        — clear the transcript
//! - `status`                                       — show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "haven-cli", version, about = "Chat with the Haven therapist persona")]
struct Cli {
    /// Haven server URL (overrides HAVEN_HTTP_URL env var)
    #[arg(long, env = "HAVEN_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send a message and print the therapist's reply
    Send {
        /// What you want to say
        message: String,

        /// Extra background passed to the model as [KNOWLEDGE]
        #[arg(long)]
        knowledge: Option<String>,

        /// Print the stored turn as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the conversation so far
    History {
        #[arg(long)]
        json: bool,
    },

    /// Show how often each emotion was detected
    Report {
        #[arg(long)]
        json: bool,
    },

    /// Clear the conversation
    Reset,

    /// Show Haven server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// A stored turn as returned by the server
#[derive(Debug, Deserialize)]
pub struct TurnView {
    pub user_text: String,
    pub emotion_label: String,
    pub emotion_score: f64,
    pub bot_text: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub turns: Vec<TurnView>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ReportResponse {
    pub counts: std::collections::HashMap<String, usize>,
    pub total: usize,
}

// ============================================================================
// Formatting
// ============================================================================

/// `2024-05-01T14:03:00Z` → `2024-05-01 14:03`
pub fn short_timestamp(ts: &str) -> String {
    ts.get(..16)
        .map(|s| s.replacen('T', " ", 1))
        .unwrap_or_else(|| ts.to_string())
}

pub fn format_turn(turn: &TurnView) -> String {
    format!(
        "[{}] You: {}\n  ({} {:.2})\nTherapist: {}",
        short_timestamp(&turn.timestamp),
        turn.user_text,
        turn.emotion_label,
        turn.emotion_score,
        turn.bot_text
    )
}

/// One line per label, most frequent first, ties by label.
pub fn format_report(report: &ReportResponse) -> Vec<String> {
    let mut entries: Vec<(&String, &usize)> = report.counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .map(|(label, count)| {
            let share = if report.total == 0 {
                0.0
            } else {
                *count as f64 * 100.0 / report.total as f64
            };
            format!("{:<12} {:>4}  {:>3.0}%", label, count, share)
        })
        .collect()
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Exit with a message on connection failure or a non-2xx reply.
fn check_response(
    url: &str,
    resp: reqwest::Result<reqwest::blocking::Response>,
) -> reqwest::blocking::Response {
    let resp = match resp {
        Ok(r) => r,
        Err(e) => {
            eprintln!("haven-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"].as_str().map(str::to_string))
            .unwrap_or(body);
        eprintln!("haven-cli: server returned {}: {}", status, message);
        std::process::exit(1);
    }

    resp
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn do_send(server: &str, message: &str, knowledge: Option<&str>, json: bool) -> anyhow::Result<()> {
    // Generation on CPU-hosted models can be slow.
    let client = client(180)?;
    let url = format!("{}/api/chat", server);
    let body = serde_json::json!({ "message": message, "knowledge": knowledge });

    let resp = check_response(&url, client.post(&url).json(&body).send());
    let value: serde_json::Value = resp.json()?;

    if json {
        return print_json(&value);
    }

    let turn: TurnView = serde_json::from_value(value)?;
    println!("({} {:.2})", turn.emotion_label, turn.emotion_score);
    println!("Therapist: {}", turn.bot_text);
    Ok(())
}

fn do_history(server: &str, json: bool) -> anyhow::Result<()> {
    let url = format!("{}/api/history", server);
    let resp = check_response(&url, client(30)?.get(&url).send());
    let value: serde_json::Value = resp.json()?;

    if json {
        return print_json(&value);
    }

    let history: HistoryResponse = serde_json::from_value(value)?;
    if history.count == 0 {
        eprintln!("No conversation yet.");
        return Ok(());
    }
    for turn in &history.turns {
        println!("{}\n", format_turn(turn));
    }
    Ok(())
}

fn do_report(server: &str, json: bool) -> anyhow::Result<()> {
    let url = format!("{}/api/report", server);
    let resp = check_response(&url, client(30)?.get(&url).send());
    let value: serde_json::Value = resp.json()?;

    if json {
        return print_json(&value);
    }

    let report: ReportResponse = serde_json::from_value(value)?;
    if report.total == 0 {
        eprintln!("No conversation yet.");
        return Ok(());
    }
    for line in format_report(&report) {
        println!("{}", line);
    }
    println!("{} messages in total", report.total);
    Ok(())
}

fn do_reset(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/api/reset", server);
    let resp = check_response(&url, client(30)?.post(&url).send());
    let value: serde_json::Value = resp.json()?;
    println!("Cleared {} turns", value["cleared"].as_u64().unwrap_or(0));
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client(10)?.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Haven server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
            println!("Emotion:      {}", body["emotion_backend"].as_str().unwrap_or("?"));
            println!("Generation:   {}", body["generation_backend"].as_str().unwrap_or("?"));
            println!("Turns:        {}", body["turns"].as_u64().unwrap_or(0));
        }
        Ok(r) => {
            eprintln!("haven-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("haven-cli: cannot reach {} — {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Send {
            message,
            knowledge,
            json,
        } => do_send(&server, &message, knowledge.as_deref(), json),
        Commands::History { json } => do_history(&server, json),
        Commands::Report { json } => do_report(&server, json),
        Commands::Reset => do_reset(&server),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("haven-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(ts: &str) -> TurnView {
        TurnView {
            user_text: "I can't focus".to_string(),
            emotion_label: "sadness".to_string(),
            emotion_score: 0.8,
            bot_text: "Try a short walk.".to_string(),
            timestamp: ts.to_string(),
        }
    }

    #[test]
    fn test_short_timestamp() {
        assert_eq!(short_timestamp("2024-05-01T14:03:00Z"), "2024-05-01 14:03");
        assert_eq!(short_timestamp("soon"), "soon");
    }

    #[test]
    fn test_format_turn() {
        let text = format_turn(&turn("2024-05-01T14:03:00Z"));
        assert_eq!(
            text,
            "[2024-05-01 14:03] You: I can't focus\n  (sadness 0.80)\nTherapist: Try a short walk."
        );
    }

    #[test]
    fn test_format_report_orders_by_count() {
        let report = ReportResponse {
            counts: [("sadness", 1), ("joy", 2), ("fear", 1)]
                .into_iter()
                .map(|(l, c)| (l.to_string(), c))
                .collect(),
            total: 4,
        };
        let lines = format_report(&report);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("joy"));
        assert!(lines[0].ends_with("50%"));
        assert!(lines[1].starts_with("fear"));
        assert!(lines[2].starts_with("sadness"));
    }

    #[test]
    fn test_history_response_parses_server_shape() {
        let body = serde_json::json!({
            "count": 1,
            "turns": [{
                "id": "7b5c24ab-1234-5678-9abc-def012345678",
                "user_text": "hi",
                "emotion_label": "joy",
                "emotion_score": 0.97,
                "bot_text": "Hello!",
                "timestamp": "2024-05-01T14:03:00Z"
            }]
        });
        let history: HistoryResponse = serde_json::from_value(body).unwrap();
        assert_eq!(history.count, 1);
        assert_eq!(history.turns[0].emotion_label, "joy");
    }
}
