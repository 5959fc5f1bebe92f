use anyhow::Result;
use colored::Colorize;
use fhirlink_oauth::TokenSet;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_field(label: &str, value: &str) {
    println!("{}: {}", label.cyan(), value);
}

/// Prints a token set without its raw response; tokens are shortened.
pub fn print_tokens(tokens: &TokenSet) -> Result<()> {
    let mut shown = tokens.clone();
    shown.access_token = preview(&shown.access_token);
    shown.refresh_token = shown.refresh_token.as_deref().map(preview);
    shown.id_token = shown.id_token.as_deref().map(preview);
    shown.raw = serde_json::Value::Null;
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

pub fn format_timestamp(unix: i64) -> String {
    OffsetDateTime::from_unix_timestamp(unix)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| unix.to_string())
}

pub fn preview(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 20 {
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 8..].iter().collect();
        format!("{head}...{tail}")
    } else {
        token.to_string()
    }
}
