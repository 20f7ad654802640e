use kitchen_core::auth::{SessionPersistence, SignUpOutcome, SignUpProfile};
use kitchen_core::guard::{Route, RouteGuard};
use tracing::warn;

use crate::auth::SessionStore;
use crate::cli::AuthCommands;
use crate::commands::common::AppContext;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub async fn run_auth(
    command: AuthCommands,
    global_profile: Option<&str>,
    demo: bool,
) -> Result<(), CliError> {
    if demo {
        return Err(CliError::DemoUnsupported("kitchen auth"));
    }

    match command {
        AuthCommands::Signup {
            email,
            password,
            name,
        } => {
            let context = AppContext::open(global_profile, false)?;
            run_signup(&context, &email, &password, name.as_deref()).await
        }
        AuthCommands::Login {
            email,
            password,
            next,
        } => {
            let context = AppContext::open(global_profile, false)?;
            let backend = context.supabase_backend("kitchen auth login")?;
            let session = backend.auth().sign_in(&email, &password).await?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{}' as {email_label}", context.profile_name);

            let destination = login_destination(next.as_deref());
            println!("Continue at {destination}: `{}`", route_command(&destination));
            Ok(())
        }
        AuthCommands::Status => {
            let context = match AppContext::open(global_profile, false) {
                Ok(context) => context,
                Err(CliError::NotConfigured) => {
                    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
                    let profile_name = config.resolve_profile_name(global_profile);
                    println!("Profile '{profile_name}' is not configured.");
                    return Ok(());
                }
                Err(error) => return Err(error),
            };
            let backend = context.supabase_backend("kitchen auth status")?;
            if let Some(session) = backend.auth().restore_session().await? {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} (expires_at={})",
                    context.profile_name, email_label, session.expires_at
                );
            } else {
                println!("Profile '{}' is not signed in.", context.profile_name);
            }
            Ok(())
        }
        AuthCommands::Logout => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(global_profile);
            let store = SessionStore::new(&profile_name);

            match (AppContext::open(global_profile, false), store.load_session()?) {
                (Ok(context), Some(session)) => {
                    let backend = context.supabase_backend("kitchen auth logout")?;
                    backend.auth().sign_out(&session.access_token).await?;
                }
                (Ok(_) | Err(CliError::NotConfigured), _) => store.clear_session()?,
                (Err(error), _) => return Err(error),
            }

            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}

async fn run_signup(
    context: &AppContext,
    email: &str,
    password: &str,
    full_name: Option<&str>,
) -> Result<(), CliError> {
    let backend = context.supabase_backend("kitchen auth signup")?;
    let profile = full_name.map(SignUpProfile::with_full_name).unwrap_or_default();

    match backend.auth().sign_up(email, password, &profile).await? {
        SignUpOutcome::SignedIn(session) => {
            if let Err(error) = backend
                .upsert_profile(&session, profile.full_name.as_deref())
                .await
            {
                warn!("Failed to save profile details: {}", error);
            }
            let email_label = session.user.email.as_deref().unwrap_or(email);
            println!(
                "Signed up profile '{}' as {email_label}",
                context.profile_name
            );
        }
        SignUpOutcome::ConfirmationRequired => {
            println!(
                "Check {email} for a confirmation link, then run `kitchen auth login --email {email} --password <password>`."
            );
        }
    }
    Ok(())
}

/// Where `--next` sends the user after signing in.
pub fn login_destination(next: Option<&str>) -> Route {
    let requested = next.and_then(|path| {
        let route = Route::parse(path);
        if route.is_none() {
            warn!("Ignoring unknown destination {}", path);
        }
        route
    });
    RouteGuard::post_login_destination(requested)
}

/// The command that shows `route`.
pub fn route_command(route: &Route) -> String {
    match route {
        Route::Home | Route::Inventory => "kitchen list".to_string(),
        Route::Location(name) => format!("kitchen locations --name \"{name}\""),
        Route::Organization => "kitchen locations".to_string(),
        Route::Manage => "kitchen add --help".to_string(),
        Route::Login => "kitchen auth login --help".to_string(),
        Route::Signup => "kitchen auth signup --help".to_string(),
    }
}
