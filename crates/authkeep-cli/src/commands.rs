use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tracing::warn;

use authkeep_core::{ApiError, Config, Identity, IdentityPatch, RegisterRequest, SessionManager};

/// Environment variable consulted before prompting for a password
const ENV_PASSWORD: &str = "AUTHKEEP_PASSWORD";

#[derive(Debug, PartialEq)]
pub enum Command {
    Login { email: Option<String>, mfa_code: Option<String> },
    Register,
    Logout,
    Refresh,
    WhoAmI,
    Status,
    SetName { first_name: Option<String>, last_name: Option<String> },
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some(name) = args.first() else {
            return Ok(Command::Help);
        };
        let rest = &args[1..];

        match name.as_str() {
            "login" => {
                let mut email = None;
                let mut mfa_code = None;
                let mut iter = rest.iter();
                while let Some(arg) = iter.next() {
                    match arg.as_str() {
                        "--mfa" => {
                            mfa_code = Some(iter.next().context("--mfa requires a code")?.clone());
                        }
                        flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
                        value if email.is_none() => email = Some(value.to_string()),
                        extra => bail!("Unexpected argument: {}", extra),
                    }
                }
                Ok(Command::Login { email, mfa_code })
            }
            "set-name" => {
                let mut first_name = None;
                let mut last_name = None;
                let mut iter = rest.iter();
                while let Some(arg) = iter.next() {
                    match arg.as_str() {
                        "--first" => first_name = Some(iter.next().context("--first requires a value")?.clone()),
                        "--last" => last_name = Some(iter.next().context("--last requires a value")?.clone()),
                        other => bail!("Unexpected argument: {}", other),
                    }
                }
                if first_name.is_none() && last_name.is_none() {
                    bail!("set-name needs --first and/or --last");
                }
                Ok(Command::SetName { first_name, last_name })
            }
            "register" => Ok(Command::Register),
            "logout" => Ok(Command::Logout),
            "refresh" => Ok(Command::Refresh),
            "whoami" => Ok(Command::WhoAmI),
            "status" => Ok(Command::Status),
            "help" | "--help" | "-h" => Ok(Command::Help),
            other => bail!("Unknown command: {}", other),
        }
    }
}

pub fn print_usage() {
    eprintln!("Usage: authkeep <command>\n");
    eprintln!("Commands:");
    eprintln!("  login [EMAIL] [--mfa CODE]        Log in and store the session");
    eprintln!("  register                          Create an account and log in");
    eprintln!("  logout                            End the session");
    eprintln!("  refresh                           Exchange the refresh token for a new access token");
    eprintln!("  whoami                            Show the cached identity");
    eprintln!("  status                            Show session state");
    eprintln!("  set-name [--first X] [--last Y]   Update the cached profile name (local cache only,");
    eprintln!("                                    does not change the account on the server)");
}

pub async fn run(command: Command, manager: &SessionManager, mut config: Config) -> Result<()> {
    match command {
        Command::Login { email, mfa_code } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => prompt("Email")?,
            };
            let password = password_from_env_or_prompt()?;

            let user = match manager.login(&email, &password, mfa_code.as_deref()).await {
                Ok(user) => user,
                Err(e) => bail!(login_error_message(&e)),
            };

            config.last_email = Some(email);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            println!("Logged in as {} <{}>", user.full_name(), user.email);
        }
        Command::Register => {
            let request = RegisterRequest {
                email: prompt("Email")?,
                first_name: prompt("First name")?,
                last_name: prompt("Last name")?,
                date_of_birth: parse_date(&prompt("Date of birth (YYYY-MM-DD)")?)?,
                country_code: prompt("Country code")?.to_uppercase(),
                password: new_password()?,
            };
            let email = request.email.clone();

            let user = match manager.register(request).await {
                Ok(user) => user,
                Err(e) => bail!(login_error_message(&e)),
            };

            config.last_email = Some(email);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            println!("Registered and logged in as {} <{}>", user.full_name(), user.email);
        }
        Command::Logout => {
            manager.logout().await;
            println!("Logged out");
        }
        Command::Refresh => {
            manager.refresh_session().await;
            if manager.is_authenticated() {
                println!("Session refreshed");
            } else {
                println!("Session expired - please log in again");
            }
        }
        Command::WhoAmI => match manager.identity() {
            Some(user) => print_identity(&user),
            None => println!("Not logged in"),
        },
        Command::Status => {
            println!("State:   {}", manager.state());
            println!("API:     {}", config.api_base_url);
            println!("Storage: {:?}", config.storage);
            if let Some(user) = manager.identity() {
                println!("User:    {}", user.email);
            }
        }
        Command::SetName { first_name, last_name } => {
            if manager.identity().is_none() {
                println!("Not logged in");
                return Ok(());
            }
            manager.update_profile(&IdentityPatch {
                first_name,
                last_name,
                ..Default::default()
            });
            if let Some(user) = manager.identity() {
                println!("Cached profile updated: {} (server account unchanged)", user.full_name());
            }
        }
        Command::Help => print_usage(),
    }
    Ok(())
}

/// User-facing text for a failed login or registration
fn login_error_message(error: &ApiError) -> String {
    match error {
        ApiError::MfaRequired => "Multi-factor code required - rerun with --mfa CODE".to_string(),
        ApiError::MfaInvalid => "Multi-factor code is incorrect".to_string(),
        e if e.is_auth_failure() => "Invalid email or password".to_string(),
        ApiError::NetworkError(e) if e.is_timeout() => "Connection timed out. Please try again.".to_string(),
        ApiError::NetworkError(_) => "Unable to connect to server. Check your internet connection.".to_string(),
        e => format!("Login failed: {}", e),
    }
}

fn print_identity(user: &Identity) {
    println!("{} <{}>", user.full_name(), user.email);
    println!("  id:         {}", user.id);
    println!("  KYC:        {} (level {})", user.kyc_status, user.kyc_level);
    println!("  risk score: {:.1}", user.risk_score);
    println!("  MFA:        {}", if user.mfa_enabled { "enabled" } else { "disabled" });
    println!("  created:    {}", user.created_at.format("%Y-%m-%d"));
    if let Some(last_login) = user.last_login_at {
        println!("  last login: {}", last_login.format("%Y-%m-%d %H:%M UTC"));
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    if input.is_empty() {
        bail!("{} is required", label);
    }
    Ok(input.to_string())
}

fn password_from_env_or_prompt() -> Result<String> {
    match std::env::var(ENV_PASSWORD) {
        Ok(password) if !password.is_empty() => Ok(password),
        _ => Ok(rpassword::prompt_password("Password: ")?),
    }
}

fn new_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    Ok(password)
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {}", input))
}
