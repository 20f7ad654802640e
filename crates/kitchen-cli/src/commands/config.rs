use std::env;

use kitchen_core::config::{
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_STORAGE_BUCKET, ENV_POLL_INTERVAL_SECS,
    ENV_STORAGE_BUCKET, ENV_SUPABASE_ANON_KEY, ENV_SUPABASE_URL, ENV_WEB_SUPABASE_ANON_KEY,
    ENV_WEB_SUPABASE_URL,
};
use kitchen_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            bucket,
            poll_interval,
            no_activate,
        } => run_config_init(
            global_profile,
            ProfileInput {
                supabase_url,
                supabase_anon_key,
                storage_bucket: bucket,
                poll_interval_secs: poll_interval,
            },
            no_activate,
        ),
        ConfigCommands::Show => run_config_show(global_profile),
    }
}

/// Values supplied on the command line for `config init`.
#[derive(Debug, Default)]
pub struct ProfileInput {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub storage_bucket: Option<String>,
    pub poll_interval_secs: Option<u64>,
}

pub fn run_config_init(
    profile_name: Option<&str>,
    input: ProfileInput,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(input, &existing, |key| env::var(key).ok())?;
    *config.profile_mut_or_default(&profile_name) = merged;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!("Profile '{profile_name}' initialized at {}", path.display());

    let profile = config
        .profile(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let missing = missing_fields(profile);
    if missing.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `kitchen auth login --email <email> --password <password>`."
        );
    } else {
        println!("Profile '{profile_name}' is missing: {}", missing.join(", "));
    }

    Ok(())
}

/// Explicit flags win over the environment, which wins over what is stored.
pub fn merge_profile(
    input: ProfileInput,
    existing: &CliProfile,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<CliProfile, CliError> {
    let from_env = |keys: &[&str]| {
        keys.iter()
            .find_map(|&key| normalize_text_option(lookup(key)))
    };

    let supabase_url = normalize_text_option(input.supabase_url)
        .or_else(|| from_env(&[ENV_SUPABASE_URL, ENV_WEB_SUPABASE_URL]))
        .or_else(|| existing.supabase_url());
    let supabase_anon_key = normalize_text_option(input.supabase_anon_key)
        .or_else(|| from_env(&[ENV_SUPABASE_ANON_KEY, ENV_WEB_SUPABASE_ANON_KEY]))
        .or_else(|| existing.supabase_anon_key());
    let storage_bucket = normalize_text_option(input.storage_bucket)
        .or_else(|| from_env(&[ENV_STORAGE_BUCKET]))
        .or_else(|| normalize_text_option(existing.storage_bucket.clone()));
    let poll_interval_secs = match input.poll_interval_secs {
        Some(secs) => Some(secs),
        None => match from_env(&[ENV_POLL_INTERVAL_SECS]) {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                CliError::Config(format!("{ENV_POLL_INTERVAL_SECS} must be a whole number"))
            })?),
            None => existing.poll_interval_secs,
        },
    };

    if let Some(url) = supabase_url.as_deref() {
        if !is_http_url(url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    if poll_interval_secs == Some(0) {
        return Err(CliError::Config(
            "poll_interval must be at least one second".to_string(),
        ));
    }

    Ok(CliProfile {
        supabase_url,
        supabase_anon_key,
        storage_bucket,
        poll_interval_secs,
    })
}

pub fn missing_fields(profile: &CliProfile) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if profile.supabase_url().is_none() {
        missing.push("supabase_url");
    }
    if profile.supabase_anon_key().is_none() {
        missing.push("supabase_anon_key");
    }
    missing
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    let active = config.active_profile.as_deref() == Some(profile_name.as_str());
    println!(
        "Profile '{profile_name}'{}",
        if active { " (active)" } else { "" }
    );
    println!(
        "  supabase_url:      {}",
        profile.supabase_url().unwrap_or_else(|| "(unset)".to_string())
    );
    println!(
        "  supabase_anon_key: {}",
        profile
            .supabase_anon_key()
            .map_or_else(|| "(unset)".to_string(), |key| mask_secret(&key))
    );
    println!(
        "  storage_bucket:    {}",
        profile
            .storage_bucket
            .as_deref()
            .unwrap_or(DEFAULT_STORAGE_BUCKET)
    );
    println!(
        "  poll_interval:     {}s",
        profile
            .poll_interval_secs
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
    );
    Ok(())
}

/// Keep the first and last four characters of long secrets.
pub fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count <= 12 {
        return "*".repeat(count);
    }
    let head = value.chars().take(4).collect::<String>();
    let tail = value.chars().skip(count - 4).collect::<String>();
    format!("{head}...{tail}")
}
