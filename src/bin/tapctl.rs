use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "tapctl")]
#[command(about = "Management CLI for the tap catalog admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Bearer token from `tapctl login`.
    #[arg(short, long, env = "TAPCTL_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the access token
    Login { email: String, password: String },
    /// List accounts (SuperAdmin)
    Users,
    /// Change an account's role to `user` or `admin` (SuperAdmin)
    SetRole { email: String, role: String },
    /// Delete an account (SuperAdmin)
    DeleteUser { email: String },
    /// List every tap, active or not (admin)
    Taps,
    /// Catalog statistics (admin)
    Stats,
    /// Recently counted client addresses (SuperAdmin)
    RateLimits,
    /// Clear the rate-limit window of an address (SuperAdmin)
    ResetLimit { address: String },
}

/// `base` joined with percent-encoded path segments.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| format!("{base} cannot be used as a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );
    }

    let admin = |path: &[&str]| {
        let mut segments = vec!["api", "admin"];
        segments.extend_from_slice(path);
        endpoint(&cli.url, &segments)
    };

    let (method, url, body) = match &cli.command {
        Commands::Login { email, password } => (
            Method::POST,
            admin(&["login"])?,
            Some(json!({ "email": email, "password": password })),
        ),
        Commands::Users => (Method::GET, admin(&["users"])?, None),
        Commands::SetRole { email, role } => (
            Method::PUT,
            admin(&["update-role"])?,
            Some(json!({ "email": email, "newRole": role })),
        ),
        Commands::DeleteUser { email } => (Method::DELETE, admin(&["delete-user", email.as_str()])?, None),
        Commands::Taps => (Method::GET, admin(&["taps"])?, None),
        Commands::Stats => (Method::GET, admin(&["stats"])?, None),
        Commands::RateLimits => (Method::GET, admin(&["rate-limits"])?, None),
        Commands::ResetLimit { address } => {
            (Method::DELETE, admin(&["rate-limits", address.as_str()])?, None)
        }
    };

    let mut request = client.request(method, url).headers(headers);
    if let Some(body) = body {
        request = request.json(&body);
    }
    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = endpoint("http://localhost:3000/", &["api", "admin", "delete-user", "a b@x.com"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/admin/delete-user/a%20b@x.com");

        let url = endpoint("http://localhost:3000", &["api", "admin", "rate-limits", "::1"]).unwrap();
        assert_eq!(url.path(), "/api/admin/rate-limits/::1");
    }
}
